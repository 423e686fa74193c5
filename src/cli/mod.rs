pub mod errors;
pub mod render;
pub mod tracing_init;

use crate::error::Error;
use crate::invocation::Arg;
use crate::metadata::{MethodMetadata, ParamBinding};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "httpbind: declarative HTTP-RPC calls from interface definitions",
    long_about = "httpbind reads interface definitions (TOML or YAML) describing HTTP\n\
                  operations and invokes them through the binding engine.\n\n\
                  Examples:\n  \
                  httpbind describe api.toml\n  \
                  httpbind call api.toml Objects get --arg bucket=photos --arg key=cat.jpg\n  \
                  httpbind call api.toml Objects get --arg key=cat.jpg --dry-run"
)]
pub struct Cli {
    /// Output all errors as structured JSON to stderr
    #[arg(long, global = true, help = "Output errors in JSON format")]
    pub json_errors: bool,

    /// Increase logging verbosity
    #[arg(
        short = 'v',
        global = true,
        action = ArgAction::Count,
        help = "Increase logging verbosity (-v for debug, -vv for trace)"
    )]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the interfaces and methods in a definitions file
    Describe {
        /// Definitions file (.toml, .yaml or .yml)
        definitions: PathBuf,
    },
    /// Invoke one method
    Call {
        /// Definitions file (.toml, .yaml or .yml)
        definitions: PathBuf,
        /// Interface name
        interface: String,
        /// Method name
        method: String,
        /// Argument by parameter name; repeat for each parameter
        #[arg(long = "arg", value_name = "NAME=VALUE")]
        args: Vec<String>,
        /// Default endpoint, overriding HTTPBIND_ENDPOINT and the config file
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
        /// Engine configuration file (TOML)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Show the request that would be sent without sending it
        #[arg(long)]
        dry_run: bool,
    },
}

/// Maps `name=value` pairs onto the method's positional parameters.
///
/// Values that look like JSON objects or arrays are passed as JSON; everything
/// else is a string. Parameters without a value are null.
///
/// # Errors
///
/// Returns an argument error for malformed pairs or unknown parameter names.
pub fn parse_args(metadata: &MethodMetadata, pairs: &[String]) -> Result<Vec<Arg>, Error> {
    let method = metadata.id.qualified_name();
    let mut args = vec![Arg::Null; metadata.params.len()];
    for (position, pair) in pairs.iter().enumerate() {
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            Error::argument(&method, pair, position, "expected NAME=VALUE")
        })?;
        let index = metadata
            .params
            .iter()
            .position(|param| param.name == name)
            .ok_or_else(|| {
                let known: Vec<&str> = metadata.params.iter().map(|p| p.name.as_str()).collect();
                Error::argument(
                    &method,
                    name,
                    position,
                    format!("no such parameter; expected one of: {}", known.join(", ")),
                )
            })?;
        if matches!(
            metadata.params[index].binding,
            Some(ParamBinding::Options | ParamBinding::OptionsVarargs)
        ) {
            return Err(Error::argument(
                &method,
                name,
                index,
                "options parameters cannot be set from the command line",
            ));
        }
        args[index] = parse_value(value);
    }
    Ok(args)
}

fn parse_value(value: &str) -> Arg {
    let trimmed = value.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(json) = serde_json::from_str(value) {
            return Arg::Json(json);
        }
    }
    Arg::Str(value.to_string())
}
