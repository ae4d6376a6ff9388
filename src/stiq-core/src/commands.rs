//! Command table and resolution.
//!
//! Each command is described once in [`COMMANDS`]. Resolution maps a name or
//! alias plus positional arguments to a [`Command`], filling declared defaults.

use std::path::PathBuf;

/// A fully bound command, ready to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Url { path: String },
    Get { path: String },
    CreateIndex,
    ListIndices,
    Bulk { file: PathBuf },
    Query { terms: Vec<String> },
}

/// Tag naming which handler a [`CommandSpec`] binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Url,
    Get,
    CreateIndex,
    ListIndices,
    Bulk,
    Query,
}

/// Positional argument shape of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    Optional {
        name: &'static str,
        default: &'static str,
    },
    Required {
        name: &'static str,
    },
    Variadic {
        name: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub arity: Arity,
    pub kind: CommandKind,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("missing required argument '{arg}' for '{command}'")]
    MissingArgument {
        command: &'static str,
        arg: &'static str,
    },

    #[error("too many arguments for '{command}': expected at most {expected}, got {got}")]
    TooManyArguments {
        command: &'static str,
        expected: usize,
        got: usize,
    },
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "url",
        aliases: &[],
        description: "generate the URL for the options and path (default is /)",
        arity: Arity::Optional {
            name: "path",
            default: "/",
        },
        kind: CommandKind::Url,
    },
    CommandSpec {
        name: "get",
        aliases: &[],
        description: "perform an HTTP GET request for path (default is /)",
        arity: Arity::Optional {
            name: "path",
            default: "/",
        },
        kind: CommandKind::Get,
    },
    CommandSpec {
        name: "create-index",
        aliases: &[],
        description: "create an index",
        arity: Arity::None,
        kind: CommandKind::CreateIndex,
    },
    CommandSpec {
        name: "list-indices",
        aliases: &["li"],
        description: "get a list of indices in this cluster",
        arity: Arity::None,
        kind: CommandKind::ListIndices,
    },
    CommandSpec {
        name: "bulk",
        aliases: &[],
        description: "read and perform bulk options from the specified file",
        arity: Arity::Required { name: "file" },
        kind: CommandKind::Bulk,
    },
    CommandSpec {
        name: "query",
        aliases: &["q"],
        description: "perform an Elasticsearch query",
        arity: Arity::Variadic { name: "queries" },
        kind: CommandKind::Query,
    },
];

/// Find a command by exact (case-sensitive) name or alias.
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name == name || spec.aliases.contains(&name))
}

/// Resolve a command name and its positional arguments.
pub fn resolve(name: &str, args: Vec<String>) -> Result<Command, ResolveError> {
    let spec = find(name).ok_or_else(|| ResolveError::UnknownCommand(name.to_string()))?;
    spec.bind(args)
}

impl CommandSpec {
    /// Arity-check `args` and build the bound command.
    pub fn bind(&self, mut args: Vec<String>) -> Result<Command, ResolveError> {
        let max = match self.arity {
            Arity::None => 0,
            Arity::Optional { .. } | Arity::Required { .. } => 1,
            Arity::Variadic { .. } => usize::MAX,
        };
        if args.len() > max {
            return Err(ResolveError::TooManyArguments {
                command: self.name,
                expected: max,
                got: args.len(),
            });
        }

        let single = match self.arity {
            Arity::Optional { default, .. } => args.pop().unwrap_or_else(|| default.to_string()),
            Arity::Required { name } => args.pop().ok_or(ResolveError::MissingArgument {
                command: self.name,
                arg: name,
            })?,
            Arity::None | Arity::Variadic { .. } => String::new(),
        };

        Ok(match self.kind {
            CommandKind::Url => Command::Url { path: single },
            CommandKind::Get => Command::Get { path: single },
            CommandKind::CreateIndex => Command::CreateIndex,
            CommandKind::ListIndices => Command::ListIndices,
            CommandKind::Bulk => Command::Bulk {
                file: PathBuf::from(single),
            },
            CommandKind::Query => Command::Query { terms: args },
        })
    }

    /// Usage line, e.g. `bulk <file>` or `query|q [queries...]`.
    pub fn usage(&self) -> String {
        let mut usage = self.name.to_string();
        for alias in self.aliases {
            usage.push('|');
            usage.push_str(alias);
        }
        match self.arity {
            Arity::None => {}
            Arity::Optional { name, .. } => usage.push_str(&format!(" [{}]", name)),
            Arity::Required { name } => usage.push_str(&format!(" <{}>", name)),
            Arity::Variadic { name } => usage.push_str(&format!(" [{}...]", name)),
        }
        usage
    }
}

/// Help section listing every command.
pub fn help_text() -> String {
    let rows: Vec<(String, &str)> = COMMANDS
        .iter()
        .map(|spec| (spec.usage(), spec.description))
        .collect();
    let width = rows.iter().map(|(usage, _)| usage.len()).max().unwrap_or(0);

    let mut text = String::from("Commands:\n");
    for (usage, description) in rows {
        text.push_str(&format!("  {:<width$}  {}\n", usage, description, width = width));
    }
    text
}
