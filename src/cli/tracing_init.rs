//! Tracing initialisation for the binary.

use crate::constants;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log sink: `HTTPBIND_LOG_FILE` when it can be opened, stderr otherwise.
struct FileOrStderr {
    file: Option<Mutex<std::fs::File>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FileOrStderr {
    type Writer = Box<dyn std::io::Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        self.file
            .as_ref()
            .and_then(|mutex| mutex.lock().ok())
            .and_then(|file| file.try_clone().ok())
            .map_or_else(
                || Box::new(std::io::stderr()) as Self::Writer,
                |cloned| Box::new(cloned) as Self::Writer,
            )
    }
}

/// Filter directive for a `-v` count, falling back to `HTTPBIND_LOG`.
#[must_use]
pub fn level_for(verbosity: u8) -> String {
    match verbosity {
        0 => std::env::var(constants::ENV_HTTPBIND_LOG).unwrap_or_else(|_| "error".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Installs the global subscriber: text or JSON per `HTTPBIND_LOG_FORMAT`.
pub fn init_tracing(verbosity: u8) {
    let env_filter = EnvFilter::try_new(level_for(verbosity)).unwrap_or_else(|_| EnvFilter::new("error"));

    let log_format = std::env::var(constants::ENV_HTTPBIND_LOG_FORMAT)
        .map_or_else(|_| "text".to_string(), |s| s.to_lowercase());
    if log_format != "json" && log_format != "text" {
        // No subscriber yet, so stderr is the only channel.
        eprintln!(
            "Warning: Unrecognized {} '{log_format}'. Valid values: 'json', 'text'. Using 'text'.",
            constants::ENV_HTTPBIND_LOG_FORMAT
        );
    }

    let writer = std::env::var(constants::ENV_HTTPBIND_LOG_FILE).ok().map_or_else(
        || FileOrStderr { file: None },
        |path| match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => FileOrStderr {
                file: Some(Mutex::new(file)),
            },
            Err(e) => {
                eprintln!("Warning: Could not open log file '{path}': {e}. Using stderr.");
                FileOrStderr { file: None }
            }
        },
    );

    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_list(false)
            .with_target(true)
            .with_line_number(true)
            .with_writer(writer);
        let _ = registry.with(json_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_writer(writer);
        let _ = registry.with(fmt_layer).try_init();
    }
}
