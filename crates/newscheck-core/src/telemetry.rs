use std::sync::OnceLock;

use tracing_subscriber::{fmt, EnvFilter};

use crate::NewsCheckError;

static TELEMETRY_GUARD: OnceLock<()> = OnceLock::new();

/// Configuration options when initialising telemetry.
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    /// Explicit filter directive; wins over `RUST_LOG`.
    pub env_filter: Option<String>,
    /// Level used when neither an explicit filter nor `RUST_LOG` is set.
    pub default_level: String,
    pub with_ansi: bool,
    /// Send log lines to stderr so that JSON verdicts on stdout stay clean.
    pub to_stderr: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            env_filter: None,
            default_level: "info".to_string(),
            with_ansi: true,
            to_stderr: true,
        }
    }
}

impl TelemetryOptions {
    pub fn with_default_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }

    pub fn with_env_filter(mut self, filter: Option<String>) -> Self {
        self.env_filter = filter;
        self
    }
}

/// Initialise the global tracing subscriber.
///
/// Safe to call multiple times; only the first invocation installs the subscriber.
pub fn init_telemetry(options: TelemetryOptions) -> Result<(), NewsCheckError> {
    if TELEMETRY_GUARD.get().is_some() {
        return Ok(());
    }

    let env_filter = options
        .env_filter
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or(options.default_level);

    let builder = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_ansi(options.with_ansi);

    let installed = if options.to_stderr {
        builder.with_writer(std::io::stderr).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| {
        NewsCheckError::InvalidConfiguration(format!("telemetry init failed: {err}"))
    })?;

    TELEMETRY_GUARD.get_or_init(|| ());
    Ok(())
}
