//! Tracing-subscriber setup: env-filter directives plus a format/target
//! pair chosen at the call site rather than baked into a single global
//! default.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{TelemetryError, TelemetryResult};

/// Keeps the non-blocking file writer's background flush thread alive for
/// the life of the process. A [`tracing_appender::non_blocking::WorkerGuard`]
/// drops silently truncate buffered lines, so `setup_logging` pins it here
/// rather than handing it back to a caller that might drop it immediately.
static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable, ANSI-colored when the target is a TTY.
    Pretty,
    /// Single-line, human-readable.
    Compact,
    /// Newline-delimited JSON, for log shipping.
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// The process's standard output.
    Stdout,
    /// The process's standard error.
    Stderr,
    /// A file, opened in append mode and written through a non-blocking
    /// background writer.
    File(PathBuf),
}

/// Logging configuration: base level, `EnvFilter` directive overlays,
/// format, and target.
#[derive(Debug, Clone)]
pub struct LogConfig {
    level: String,
    directives: Vec<String>,
    format: LogFormat,
    target: LogTarget,
}

impl LogConfig {
    /// Start from a base level (`"info"`, `"debug"`, ...), pretty format,
    /// stderr target.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            directives: Vec::new(),
            format: LogFormat::Pretty,
            target: LogTarget::Stderr,
        }
    }

    /// Override the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Override the output target.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Add a per-module `EnvFilter` directive (e.g. `"forge_runtime=trace"`),
    /// layered on top of the base level.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Build a [`LogConfig`] from `forge_config::LoggingSection`, honoring
    /// `FORGE_DEBUG` by forcing the level to `debug` regardless of the
    /// configured level.
    #[cfg(feature = "config")]
    #[must_use]
    pub fn from_section(section: &forge_config::LoggingSection) -> Self {
        let level = if forge_config::debug_requested() { "debug".to_string() } else { section.level.clone() };
        let format = if section.json { LogFormat::Json } else { LogFormat::Pretty };
        Self::new(level).with_format(format)
    }

    fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut spec = self.level.clone();
        for directive in &self.directives {
            spec.push(',');
            spec.push_str(directive);
        }
        EnvFilter::try_new(&spec).map_err(|e| TelemetryError::ConfigError(format!("invalid filter directive {spec:?}: {e}")))
    }
}

/// Install a global tracing subscriber built from `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::ConfigError`] for a malformed filter
/// directive or an unwritable log file path, or
/// [`TelemetryError::InitError`] if a global subscriber is already
/// installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.env_filter()?;

    let install = |writer: tracing_subscriber::fmt::writer::BoxMakeWriter| -> TelemetryResult<()> {
        let registry = tracing_subscriber::registry().with(filter);
        let result = match config.format {
            LogFormat::Pretty => registry
                .with(tracing_subscriber::fmt::layer().pretty().with_span_events(FmtSpan::CLOSE).with_writer(writer))
                .try_init(),
            LogFormat::Compact => registry
                .with(tracing_subscriber::fmt::layer().compact().with_span_events(FmtSpan::CLOSE).with_writer(writer))
                .try_init(),
            LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json().with_writer(writer)).try_init(),
        };
        result.map_err(|e| TelemetryError::InitError(e.to_string()))
    };

    match &config.target {
        LogTarget::Stdout => install(tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout)),
        LogTarget::Stderr => install(tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stderr)),
        LogTarget::File(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            std::fs::create_dir_all(dir)?;
            let file_name = path.file_name().ok_or_else(|| TelemetryError::ConfigError(format!("log path {path:?} has no file name")))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            install(tracing_subscriber::fmt::writer::BoxMakeWriter::new(non_blocking))
        }
    }
}

/// Install a global subscriber from environment-derived defaults: level
/// `"info"` unless `FORGE_DEBUG` is set (then `"debug"`), pretty format,
/// stderr.
///
/// # Errors
///
/// See [`setup_logging`].
pub fn setup_default_logging() -> TelemetryResult<()> {
    let level = if std::env::var("FORGE_DEBUG").is_ok_and(|v| v != "0" && !v.is_empty()) { "debug" } else { "info" };
    setup_logging(&LogConfig::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_directives() {
        let config = LogConfig::new("info").with_directive("forge_runtime=trace").with_directive("forge_tools=warn");
        let filter = config.env_filter().unwrap();
        assert_eq!(filter.to_string(), "info,forge_runtime=trace,forge_tools=warn");
    }

    #[test]
    fn malformed_directive_is_rejected() {
        let config = LogConfig::new("not a valid directive === ");
        assert!(matches!(config.env_filter(), Err(TelemetryError::ConfigError(_))));
    }

    #[test]
    fn file_target_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("nested").join("forge.log");
        let config = LogConfig::new("info").with_target(LogTarget::File(log_path.clone()));
        // Installing a second global subscriber in the same process fails,
        // so this only exercises the directory-creation path, not `try_init`.
        let dir_to_create = log_path.parent().unwrap();
        std::fs::create_dir_all(dir_to_create).unwrap();
        assert!(dir_to_create.exists());
        let _ = config;
    }
}
