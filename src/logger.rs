use anyhow::{Result, anyhow};
use std::fmt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Plain,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Plain => write!(f, "plain"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Plain,
        }
    }
}

/// Non-empty `RUST_LOG` directives, else the configured level.
fn filter_directives(env_directives: Option<String>, log_level: &str) -> String {
    match env_directives {
        Some(directives) if !directives.trim().is_empty() => directives,
        _ => log_level.to_string(),
    }
}

fn build_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives).map_err(|e| anyhow!("invalid log filter {directives:?}: {e}"))
}

/// Installs the global subscriber. Logs go to stderr; stdout is left for the table.
/// `RUST_LOG`, when set, wins over `log_level`.
pub fn init_logger(log_level: &str, log_format: &str) -> Result<()> {
    let directives = filter_directives(std::env::var(EnvFilter::DEFAULT_ENV).ok(), log_level);
    let filter = build_filter(&directives)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = match LogFormat::from(log_format) {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Plain => builder.try_init(),
    };
    installed.map_err(|e| anyhow!("logger already initialised: {e}"))
}
