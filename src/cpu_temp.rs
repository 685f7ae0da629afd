use crate::config::SensorConfig;
use crate::errors::{FanControlError, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

/// Plausible range for a die temperature; anything else is a bad reading
const VALID_RANGE: std::ops::RangeInclusive<f32> = -50.0..=200.0;

/// Longest a sensor command may run before the read counts as failed
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that reports the current CPU temperature in degrees Celsius
#[async_trait]
pub trait TemperatureSource: Send {
    async fn read(&mut self) -> Result<f32>;
}

/// Build the sensor described by the configuration
pub fn from_config(config: &SensorConfig) -> Box<dyn TemperatureSource> {
    match config {
        SensorConfig::Vcgencmd { command } => {
            info!("Reading temperature with `{}`", command.join(" "));
            Box::new(VcgencmdSensor::new(command.clone()))
        }
        SensorConfig::ThermalZone { path } => {
            info!("Reading temperature from {}", path.display());
            Box::new(ThermalZoneSensor::new(path.clone()))
        }
    }
}

/// Runs `vcgencmd measure_temp` (or a compatible command) and parses its output
#[derive(Debug, Clone)]
pub struct VcgencmdSensor {
    command: Vec<String>,
    timeout: Duration,
}

impl VcgencmdSensor {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            timeout: COMMAND_TIMEOUT,
        }
    }

    /// Kill the command if it has not finished after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TemperatureSource for VcgencmdSensor {
    async fn read(&mut self) -> Result<f32> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| FanControlError::SensorRead("No sensor command configured".to_string()))?;

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(program).args(args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| {
            FanControlError::SensorRead(format!("{} timed out after {:?}", program, self.timeout))
        })?
        .map_err(|e| FanControlError::SensorRead(format!("Failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(FanControlError::SensorRead(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("{} printed {:?}", program, stdout.trim());
        check_range(parse_measure_temp(&stdout)?)
    }
}

/// Parse `temp=<float>'C`
pub fn parse_measure_temp(output: &str) -> Result<f32> {
    let output = output.trim();
    let malformed = |what: &str| {
        FanControlError::SensorRead(format!("Unexpected sensor output {:?}: {}", output, what))
    };

    let (_, value) = output.split_once('=').ok_or_else(|| malformed("missing '='"))?;
    let (value, _) = value
        .split_once('\'')
        .ok_or_else(|| malformed("missing unit suffix"))?;

    value
        .trim()
        .parse::<f32>()
        .map_err(|e| malformed(&e.to_string()))
}

/// Reads a sysfs thermal zone reporting millidegrees Celsius
#[derive(Debug, Clone)]
pub struct ThermalZoneSensor {
    path: PathBuf,
}

impl ThermalZoneSensor {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl TemperatureSource for ThermalZoneSensor {
    async fn read(&mut self) -> Result<f32> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            FanControlError::SensorRead(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let millidegrees: i32 = content.trim().parse().map_err(|_| {
            FanControlError::SensorRead(format!(
                "Failed to parse temperature {:?} from {}",
                content.trim(),
                self.path.display()
            ))
        })?;

        check_range(millidegrees as f32 / 1000.0)
    }
}

fn check_range(temp: f32) -> Result<f32> {
    if !VALID_RANGE.contains(&temp) {
        return Err(FanControlError::SensorRead(format!(
            "Temperature reading out of range: {:.1}°C",
            temp
        )));
    }
    Ok(temp)
}
