//! Subscriber setup for host applications
//!
//! The library itself only emits spans and events. Binaries embedding the
//! removal service can use [`TracingConfig`] to install a `tracing-subscriber`
//! pipeline with a verbosity-derived or explicit filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output format for the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Colored compact output for interactive terminals
    #[default]
    Console,
    /// Plain compact output for CI and log collectors without ANSI support
    Compact,
    /// JSON lines with span context
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Subscriber configuration
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Verbosity level, 0 = info, 1 = debug, 2+ = trace
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Explicit filter directives; takes precedence over `verbosity`
    pub env_filter: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter level implied by `verbosity`
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Filter the subscriber will be installed with
    ///
    /// # Errors
    /// - Invalid filter directives
    pub fn build_filter(&self) -> anyhow::Result<EnvFilter> {
        let directives = self
            .env_filter
            .as_deref()
            .unwrap_or_else(|| self.verbosity_to_filter());
        EnvFilter::try_new(directives)
            .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", directives, e))
    }

    /// Install the subscriber as the global default
    ///
    /// # Errors
    /// - Invalid filter directives
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let registry = Registry::default().with(self.build_filter()?);

        match self.format {
            TracingFormat::Console => registry
                .with(
                    fmt::layer()
                        .with_ansi(true)
                        .with_target(false)
                        .with_level(true)
                        .compact(),
                )
                .try_init()?,
            TracingFormat::Compact => registry
                .with(fmt::layer().with_ansi(false).with_target(false).compact())
                .try_init()?,
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(true),
                )
                .try_init()?,
        }

        tracing::debug!(verbosity = self.verbosity, "Tracing initialized");
        Ok(())
    }
}
