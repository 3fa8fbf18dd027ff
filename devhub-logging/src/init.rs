use anyhow::Result;
use devhub_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Filter for the configured level, falling back to `RUST_LOG` and then `info`
pub fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config.level.as_str());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // try_init so a second call (tests, embedding) keeps the first subscriber
    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = build_env_filter(log_level);

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devhub_config::LogLevel;

    #[test]
    fn test_filter_uses_configured_level() {
        let filter = build_env_filter("debug");
        assert!(filter.to_string().contains("debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            ..LoggingConfig::default()
        };
        assert!(init_logging_from_config(&config).is_ok());
        assert!(init_simple_tracing("info").is_ok());
    }
}
