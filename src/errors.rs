use thiserror::Error;

/// Transport-level failures on the shared I2C bus or the GPIO pin pair.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("I2C transaction failed: {0}")]
    I2c(String),

    #[error("GPIO line access failed: {0}")]
    Gpio(String),
}

/// Device-level error taxonomy for the sensor drivers.
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("bus transport error: {0}")]
    Bus(#[from] BusError),

    #[error("device busy (status {status:#04x})")]
    Busy { status: u8 },

    #[error("device reports uncalibrated (status {status:#04x})")]
    NotCalibrated { status: u8 },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("timed out waiting for data ready after {polls} polls")]
    Timeout { polls: u32 },

    #[error("'{sensor}' has no sample to convert: {reason}")]
    NotReady { sensor: &'static str, reason: &'static str },
}

/// Configuration-file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from '{path}': {source}")]
    LoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration format: {0}")]
    FormatError(#[from] toml::de::Error),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<SensorError> for String {
    fn from(error: SensorError) -> Self {
        error.to_string()
    }
}

impl From<ConfigError> for String {
    fn from(error: ConfigError) -> Self {
        error.to_string()
    }
}

/// Result type aliases for convenience
pub type BusResult<T> = Result<T, BusError>;
pub type SensorResult<T> = Result<T, SensorError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
