//! Error display for the binary.

use crate::constants;
use crate::error::Error;

/// Prints an error as JSON or in the human format.
pub fn print_error_with_json(error: &Error, json_format: bool) {
    if !json_format {
        print_error(error);
        return;
    }
    let Ok(json_output) = serde_json::to_string_pretty(&error.to_json()) else {
        print_error(error);
        return;
    };
    eprintln!("{json_output}");
}

fn with_hint(title: &str, error: &Error, hint: &str) {
    eprintln!("{title}\n{error}\n\nHint: {hint}");
}

fn print_body(body: Option<&String>) {
    if let Some(body) = body.filter(|b| !b.is_empty()) {
        eprintln!("\nResponse body:\n{body}");
    }
}

/// Prints a user-facing message with a hint where one applies.
pub fn print_error(error: &Error) {
    match error {
        Error::Configuration { .. } => with_hint("Configuration Error", error, constants::ERR_METADATA),
        Error::Argument { .. } => with_hint("Argument Error", error, constants::ERR_ARGUMENT),
        Error::Transport { .. } | Error::RetryLimitExceeded { .. } => {
            with_hint("Connection Error", error, constants::ERR_CONNECTION);
        }
        Error::Timeout { .. } => with_hint("Timeout Error", error, constants::ERR_TIMEOUT),
        Error::Cancelled { .. } => eprintln!("Cancelled\n{error}"),
        Error::Transform { .. } => with_hint("Response Error", error, constants::ERR_JSON_SYNTAX),
        Error::Http { status, body, .. } => {
            match status {
                500..=599 => with_hint("Server Error", error, constants::ERR_SERVER_ERROR),
                _ => eprintln!("HTTP Error\n{error}"),
            }
            print_body(body.as_ref());
        }
        Error::Authorization { body, .. } => {
            with_hint("Authorization Error", error, constants::ERR_API_CREDENTIALS);
            print_body(body.as_ref());
        }
        Error::ResourceNotFound { body, .. } => {
            with_hint("Not Found Error", error, constants::ERR_ENDPOINT_NOT_FOUND);
            print_body(body.as_ref());
        }
        Error::IllegalState { body, .. } => {
            with_hint("Conflict Error", error, constants::ERR_CONFLICT);
            print_body(body.as_ref());
        }
        Error::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => {
                with_hint("File Not Found", error, constants::ERR_FILE_NOT_FOUND);
            }
            _ => eprintln!("File System Error\n{io_err}"),
        },
        Error::Yaml(_) => with_hint("YAML Parsing Error", error, constants::ERR_YAML_SYNTAX),
        Error::Json(_) => with_hint("JSON Parsing Error", error, constants::ERR_JSON_SYNTAX),
        Error::Toml(_) => with_hint("TOML Parsing Error", error, constants::ERR_TOML_SYNTAX),
        Error::Anyhow(anyhow_err) => eprintln!("Error\n{anyhow_err}"),
    }
}
