use clap::Parser;
use stiq_core::ConnectionOptions;

/// stiq - talk to an Elasticsearch cluster from the shell
#[derive(Parser, Debug)]
#[command(name = "stiq")]
#[command(author, version, about, long_about = None)]
#[command(override_usage = "stiq [OPTIONS] <COMMAND> [ARGS]...")]
#[command(after_help = stiq_core::commands::help_text())]
pub struct Cli {
    /// hostname
    #[arg(short = 'o', long, value_name = "hostname", default_value = "localhost")]
    pub host: String,

    /// port number
    #[arg(short = 'p', long, value_name = "number", default_value = "9200")]
    pub port: String,

    /// format output as JSON
    #[arg(short = 'j', long)]
    pub json: bool,

    /// which index to use
    #[arg(short = 'i', long, value_name = "name")]
    pub index: Option<String>,

    /// default type for bulk operation
    #[arg(short = 't', long = "type", value_name = "type")]
    pub doc_type: Option<String>,

    /// source filter for query results
    #[arg(short = 'f', long, value_name = "fields")]
    pub filter: Option<String>,

    /// Command to run
    #[arg(value_name = "COMMAND")]
    pub command: Option<String>,

    /// Arguments for the command
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,
}

impl Cli {
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            host: self.host.clone(),
            port: self.port.clone(),
            json: self.json,
            index: self.index.clone(),
            doc_type: self.doc_type.clone(),
            filter: self.filter.clone(),
        }
    }
}
