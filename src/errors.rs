//! Error types for the fan controller

use thiserror::Error;

/// Result type alias for the fan controller
pub type Result<T> = std::result::Result<T, FanControlError>;

/// Main error type for the fan controller
///
/// Every variant is fatal at the process boundary: the binary logs it,
/// releases the fan array and exits non-zero.
#[derive(Error, Debug)]
pub enum FanControlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to initialize fan on GPIO {gpio}: {reason}")]
    HardwareInit { gpio: u8, reason: String },

    #[error("Failed to read temperature: {0}")]
    SensorRead(String),

    #[error("Failed to set duty cycle on fan {fan}: {reason}")]
    HardwareWrite { fan: usize, reason: String },

    #[error("Fans have been shut down and their pins released")]
    ShutDown,

    #[error("No duty cycle threshold applies to temperature {temperature}°C")]
    Resolution { temperature: f32 },
}

impl FanControlError {
    /// True for errors raised while loading or validating configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Yaml(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_loading_errors_count_as_config() {
        assert!(FanControlError::Config("bad".to_string()).is_config());
        assert!(FanControlError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)).is_config());
        assert!(!FanControlError::ShutDown.is_config());
        assert!(!FanControlError::SensorRead("x".to_string()).is_config());
        assert!(!FanControlError::HardwareInit {
            gpio: 14,
            reason: "busy".to_string()
        }
        .is_config());
    }
}
