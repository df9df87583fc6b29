//! Command-line interface for auth-session.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::Backend;

/// Subcommand to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set one attribute.
    Set {
        id: String,
        key: String,
        value: String,
    },
    /// Print one attribute, or the whole session.
    Get { id: String, key: Option<String> },
    /// Remove one attribute.
    Del { id: String, key: String },
    /// Remove the whole session.
    Destroy { id: String },
    /// List session ids under the prefix.
    List,
    /// Print the TTL sentinel of a raw storage key.
    Ttl { key: String },
    /// Check the backend.
    Ping,
    /// Run the built-in walkthrough.
    Demo,
}

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Storage key prefix (overrides config file).
    pub prefix: Option<String>,
    /// Storage backend (overrides config file).
    pub backend: Option<Backend>,
    /// Store file for the file backend.
    pub store: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Command to run; `None` prints help.
    pub command: Option<Command>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut positional: Vec<String> = Vec::new();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('p') | Long("prefix") => {
                result.prefix = Some(parser.value()?.parse()?);
            }
            Short('b') | Long("backend") => {
                let value: String = parser.value()?.parse()?;
                result.backend = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("backend", value))?,
                );
            }
            Short('s') | Long("store") => {
                result.store = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                positional.push(val.string()?);
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if !positional.is_empty() {
        result.command = Some(parse_command(positional)?);
    }

    Ok(result)
}

fn parse_command(words: Vec<String>) -> Result<Command, ArgsError> {
    let mut words = words.into_iter();
    let name = words.next().unwrap_or_default();
    let rest: Vec<String> = words.collect();

    let command = match (name.as_str(), rest.as_slice()) {
        ("set", [id, key, value]) => Command::Set {
            id: id.clone(),
            key: key.clone(),
            value: value.clone(),
        },
        ("get", [id]) => Command::Get {
            id: id.clone(),
            key: None,
        },
        ("get", [id, key]) => Command::Get {
            id: id.clone(),
            key: Some(key.clone()),
        },
        ("del", [id, key]) => Command::Del {
            id: id.clone(),
            key: key.clone(),
        },
        ("destroy", [id]) => Command::Destroy { id: id.clone() },
        ("list", []) => Command::List,
        ("ttl", [key]) => Command::Ttl { key: key.clone() },
        ("ping", []) => Command::Ping,
        ("demo", []) => Command::Demo,
        ("set" | "get" | "del" | "destroy" | "list" | "ttl" | "ping" | "demo", _) => {
            return Err(ArgsError::WrongArity(name));
        }
        _ => return Err(ArgsError::UnexpectedArgument(name)),
    };
    Ok(command)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"auth-session {version}
Inspect and edit storage-backed authentication sessions

USAGE:
    auth-session [OPTIONS] <COMMAND>

COMMANDS:
    set <ID> <KEY> <VALUE>  Set an attribute (VALUE parsed as JSON, else text)
    get <ID> [KEY]          Print one attribute or the whole session
    del <ID> <KEY>          Remove an attribute
    destroy <ID>            Remove the session record
    list                    List session ids under the prefix
    ttl <RAW-KEY>           Print remaining TTL (-1 never expires, -2 absent)
    ping                    Check that the backend is reachable
    demo                    Run a walkthrough against the configured backend

OPTIONS:
    -c, --config <FILE>     Path to configuration file (JSON)
    -p, --prefix <PREFIX>   Storage key prefix [default: satoken:]
    -b, --backend <NAME>    Storage backend: memory, file [default: memory]
    -s, --store <FILE>      Store file for the file backend
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

    Put `--` before a VALUE that starts with `-`; anything after it is
    positional.

ENVIRONMENT VARIABLES:
    AUTH_SESSION_PREFIX     Key prefix (overrides config)
    AUTH_SESSION_BACKEND    Backend name (overrides config)
    AUTH_SESSION_STORE      Store file (overrides config)
    AUTH_SESSION_LOG_LEVEL  Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Walkthrough in memory
    auth-session demo

    # Persist to a file shared across invocations
    auth-session -b file -s sessions.json set 1000 role '"admin"'
    auth-session -b file -s sessions.json get 1000 role

    # Negative number as a value
    auth-session set 1000 delta -- -5
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("auth-session {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unknown command.
    UnexpectedArgument(String),
    /// Known command with the wrong number of arguments.
    WrongArity(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
            Self::WrongArity(cmd) => {
                write!(f, "wrong number of arguments for '{}'", cmd)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
