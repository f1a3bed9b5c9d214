//! Log routing.
//!
//! Two sinks:
//! - the general log (stderr or `-e FILE`, text or JSON), filtered by
//!   `RUST_LOG` or the configured level
//! - the fault log (stdout or `-f FILE`), which receives only events under
//!   [`FAULT_LOG_TARGET`]; those never reach the general log

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use rplwatch_core::{ConfigError, FAULT_LOG_TARGET};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LogSection};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
pub fn init(config: &LogSection) -> anyhow::Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let layers = build_layers(config, env.as_deref())?;
    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("failed to install log subscriber")
}

fn build_layers(config: &LogSection, env_directives: Option<&str>) -> anyhow::Result<Vec<BoxedLayer>> {
    let level = level_directive(&config.level)?;
    let directives = match env_directives.map(str::trim) {
        Some(env) if !env.is_empty() => env.to_string(),
        _ => format!("{level},sqlx=warn"),
    };
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter '{directives}'"))?
        .add_directive(format!("{FAULT_LOG_TARGET}=off").parse()?);

    let (writer, ansi) = match &config.file {
        Some(path) => (BoxMakeWriter::new(Mutex::new(append(path)?)), false),
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };
    let general = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    };

    let fault_writer = match &config.fault_file {
        Some(path) => BoxMakeWriter::new(Mutex::new(append(path)?)),
        None => BoxMakeWriter::new(std::io::stdout),
    };
    let faults = tracing_subscriber::fmt::layer()
        .with_writer(fault_writer)
        .with_ansi(false)
        .with_target(false)
        .with_level(false)
        .with_filter(Targets::new().with_target(FAULT_LOG_TARGET, LevelFilter::INFO))
        .boxed();

    Ok(vec![general, faults])
}

/// Map a `-l` level name onto a filter directive.
fn level_directive(level: &str) -> Result<&'static str, ConfigError> {
    match level.to_ascii_lowercase().as_str() {
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        _ => Err(ConfigError::LogLevel(level.to_string())),
    }
}

fn append(path: &Path) -> anyhow::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}
