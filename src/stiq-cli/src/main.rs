//! stiq - command line client for the Elasticsearch REST API
//!
//! Usage:
//!   stiq url _search                 # Print the URL a path resolves to
//!   stiq --json get /                # GET a path, output as one JSON line
//!   stiq -i books create-index       # Create an index
//!   stiq li                          # List indices
//!   stiq -i books bulk docs.json     # Stream a bulk file
//!   stiq -i books q title:rust       # Run a query

use anyhow::Result;
use clap::{CommandFactory, Parser};
use stiq_core::commands;
use stiq_rs::Client;

mod cli;
mod telemetry;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered logs are flushed on exit
    let _guard = telemetry::init_telemetry()?;

    let Some(name) = cli.command.clone() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let options = cli.connection_options();
    tracing::debug!(?options, command = %name, "stiq starting");

    let command = commands::resolve(&name, cli.args)?;
    let client = Client::new(options);

    let mut stdout = tokio::io::stdout();
    if let Err(e) = client.run(command, &mut stdout).await {
        tracing::error!(error = %e, "command failed");
        return Err(e.into());
    }

    Ok(())
}
