//! Tracing subscriber setup

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::client::config::LoggingConfig;

/// Install a global fmt subscriber filtered at `config.level`
///
/// `RUST_LOG` wins over the configured level. Returns `false` when a global
/// subscriber was already installed, which leaves that one in place.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::config::LogLevel;

    #[test]
    fn test_second_init_is_a_no_op() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            ..Default::default()
        };

        init_logging(&config);
        assert!(!init_logging(&config));
        tracing::debug!("logging initialised");
    }
}
