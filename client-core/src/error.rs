use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Telemetry error: {0}")]
    TelemetryError(String),
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::ConfigError(anyhow::Error::new(err))
    }
}
