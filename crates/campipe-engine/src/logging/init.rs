use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info", "warn",
/// "campipe_engine::feed=trace"). Without one, `RUST_LOG` is consulted, and
/// without that the campipe crates log at `info` and everything else at
/// `warn`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    /// Millisecond timestamps on every line. Off for log collectors that
    /// stamp lines themselves.
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            timestamps: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self { env_filter: Some(filter.into()), ..Self::default() }
    }
}

const DEFAULT_FILTER: &str = "warn,campipe_engine=info,campipe_studio=info";

static INIT: Once = Once::new();

/// Installs `env_logger` as the `log` backend, once per process.
///
/// Later calls are no-ops, so tests and binaries can both call it.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = config
            .env_filter
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());

        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&filter);
        builder.write_style(config.write_style);
        if config.timestamps {
            builder.format_timestamp_millis();
        } else {
            builder.format_timestamp(None);
        }

        // A test harness may have installed a logger already.
        if builder.try_init().is_err() {
            return;
        }
        log::debug!("logging initialized with filter {filter:?}");
    });
}
