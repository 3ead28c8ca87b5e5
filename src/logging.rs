//! Process-wide `tracing` setup. Call [`init_tracing`] once from the host
//! application; library code never calls it.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub app_name: String,
    pub log_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            app_name: "bridge-media-core".to_string(),
            log_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        Self {
            level,
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }
}

/// Install a global `tracing` subscriber built from `config`, honouring
/// `RUST_LOG` on top of `config.level`.
pub fn init_tracing(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(
        config
            .level
            .to_string()
            .parse()
            .map_err(|e| Error::Config(format!("invalid log level directive: {e}")))?,
    );
    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .init();
    Ok(())
}

pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| Error::Config(format!("invalid log level: {level}")))
}
