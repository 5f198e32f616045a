use nix::errno::Errno;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the I2C control-block codec and transaction engine
#[derive(Error, Debug)]
pub enum BusError {
    #[error("I2C device '{path}' unavailable: {source}")]
    DeviceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I2C control call {call} failed: {errno}")]
    IoFailure { call: &'static str, errno: Errno },

    #[error("I2C read returned {actual} byte(s), expected {expected}")]
    ShortRead { expected: usize, actual: usize },

    #[error("I2C write accepted {actual} byte(s), expected {expected}")]
    ShortWrite { expected: usize, actual: usize },

    #[error("I2C payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("I2C block read reported length {actual}, requested {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Invalid I2C address {address:#05x}")]
    InvalidAddress { address: u16 },

    #[error("Invalid I2C transaction: {reason}")]
    InvalidTransaction { reason: String },

    #[error("No I2C slave address selected on this handle")]
    NoAddressSelected,
}

impl BusError {
    /// Raw errno of a failed control call, if that is what this error is
    pub fn code(&self) -> Option<i32> {
        match self {
            BusError::IoFailure { errno, .. } => Some(*errno as i32),
            BusError::DeviceUnavailable { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// Errors raised by the sysfs backends and the pin resource manager
#[derive(Error, Debug)]
pub enum PinError {
    #[error("Failed to export line {line}: {source}")]
    PinExportFailure {
        line: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to unexport line {line}: {source}")]
    PinUnexportFailure {
        line: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O on '{path}' failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected content '{content}' in '{path}'")]
    InvalidValue { path: PathBuf, content: String },

    #[error("Unknown pin '{pin}' for board '{board}'")]
    UnknownPin { pin: String, board: &'static str },

    #[error("Pin '{pin}' has no GPIO line on this board")]
    NoGpioLine { pin: String },

    #[error("Line {line} is not acquired")]
    NotAcquired { line: u32 },

    #[error("Pin '{pin}' is not PWM capable")]
    NotPwmCapable { pin: String },
}

/// Peripheral driver errors
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("I2C communication failed: {0}")]
    Bus(#[from] BusError),

    #[error("Sensor '{sensor}' {capability} is not enabled")]
    CapabilityDisabled {
        sensor: String,
        capability: &'static str,
    },

    #[error("Invalid {capability} scale '{label}', use one of {valid}")]
    InvalidScale {
        capability: &'static str,
        label: String,
        valid: String,
    },

    #[error("Sensor '{sensor}' initialization failed: {reason}")]
    InitError { sensor: String, reason: String },

    #[error("Sensor '{sensor}' initialization reported {} error(s): {}", .errors.len(), join_errors(.errors))]
    PartialInit {
        sensor: String,
        errors: Vec<SensorError>,
    },

    #[error("Unsupported sensor driver: '{driver}'")]
    UnsupportedDriver { driver: String },
}

/// Board adaptor errors
#[derive(Error, Debug)]
pub enum AdaptorError {
    #[error(transparent)]
    Pin(#[from] PinError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("I2C bus has not been started")]
    I2cNotStarted,

    #[error("Adaptor is not connected")]
    NotConnected,
}

/// Configuration-related errors
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

/// Registry and initialization errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Board initialization failed: {0}")]
    Adaptor(#[from] AdaptorError),

    #[error("Failed to create sensor driver: {0}")]
    DriverCreationError(#[source] SensorError),

    #[error("Sensor registration failed: {0}")]
    RegistrationError(#[source] SensorError),

    #[error("Bus '{bus}' not found or unavailable")]
    BusNotFound { bus: String },
}

fn join_errors(errors: &[SensorError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
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
pub type PinResult<T> = Result<T, PinError>;
pub type SensorResult<T> = Result<T, SensorError>;
pub type AdaptorResult<T> = Result<T, AdaptorError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type RegistryResult<T> = Result<T, RegistryError>;
