use std::sync::Once;

use log::LevelFilter;

/// How [`init_logging`] sets up `env_logger`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `env_logger` directives such as `"info,geodeck_engine::manager=debug"`.
    /// `None` defers to `RUST_LOG`.
    pub filter: Option<String>,
    /// Level used when neither `filter` nor `RUST_LOG` is set.
    pub fallback_level: LevelFilter,
    pub timestamps: bool,
    pub module_path: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            fallback_level: LevelFilter::Info,
            timestamps: true,
            module_path: true,
        }
    }
}

impl LoggingConfig {
    /// Fixed directives; `RUST_LOG` is ignored.
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..Self::default()
        }
    }

    fn directives(&self) -> Option<String> {
        self.filter.clone().or_else(|| std::env::var("RUST_LOG").ok())
    }

    fn builder(&self) -> env_logger::Builder {
        let mut builder = env_logger::Builder::new();
        match self.directives() {
            Some(directives) => builder.parse_filters(&directives),
            None => builder.filter_level(self.fallback_level),
        };
        if !self.timestamps {
            builder.format_timestamp(None);
        }
        builder.format_module_path(self.module_path);
        builder
    }
}

static INIT: Once = Once::new();

/// Installs `env_logger` as the `log` backend. Only the first call counts.
///
/// A backend installed earlier by an embedding host is left alone.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| match config.builder().try_init() {
        Ok(()) => log::debug!("env_logger installed"),
        Err(_) => log::debug!("a logger was already installed"),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins() {
        let config = LoggingConfig::with_filter("warn,geodeck_engine=trace");
        assert_eq!(config.directives().as_deref(), Some("warn,geodeck_engine=trace"));
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig::with_filter("off"));
    }
}
