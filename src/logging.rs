//! Subscriber setup for the binary.
//!
//! The library only emits `tracing` events; whoever drives it decides where
//! they go by calling [`init`] (or installing its own subscriber).

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Where and how verbosely to log.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Append to this file instead of writing to stderr.
    pub file: Option<PathBuf>,
    /// Count of `-v` flags.
    pub verbosity: u8,
}

impl LogOptions {
    /// Level used when `RUST_LOG` is not set. `info` is the floor so every
    /// skip decision is recorded.
    pub fn default_level(&self) -> &'static str {
        match self.verbosity {
            0 | 1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Install the global subscriber.
pub fn init(options: &LogOptions) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("reposnap={}", options.default_level())));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let installed = match &options.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
