//! Configuration file loading and validation

use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{FanControlError, Result};
use crate::fan::ThresholdTable;

/// One physical fan. Fans are identified by their position in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FanSpec {
    /// BCM pin number
    pub gpio: u8,
    /// PWM frequency in Hz
    pub hz: u32,
}

/// Where the temperature comes from
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorConfig {
    /// Run a command printing `temp=<float>'C`
    Vcgencmd {
        #[serde(default = "default_vcgencmd")]
        command: Vec<String>,
    },
    /// Read millidegrees from a sysfs thermal zone
    ThermalZone {
        #[serde(default = "default_thermal_zone")]
        path: PathBuf,
    },
}

fn default_vcgencmd() -> Vec<String> {
    vec!["vcgencmd".to_string(), "measure_temp".to_string()]
}

fn default_thermal_zone() -> PathBuf {
    PathBuf::from("/sys/class/thermal/thermal_zone0/temp")
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig::Vcgencmd {
            command: default_vcgencmd(),
        }
    }
}

/// PWM implementation driving the fans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Software PWM on the GPIO header
    #[default]
    Rppal,
    /// In-memory channels, for hosts without GPIO
    Simulated,
}

/// Controller configuration, immutable once loaded
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub fans: Vec<FanSpec>,
    pub temp_to_duty_cycle_thresholds: ThresholdTable,
    pub timeout_seconds: f64,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub backend: BackendKind,
    /// Extra attempts per tick when the sensor read fails
    #[serde(default)]
    pub sensor_retries: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    config: Config,
}

impl Config {
    /// Load and validate a YAML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Parse and validate a YAML document with a top-level `config` key
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        file.config.validate()?;
        Ok(file.config)
    }

    /// Check every invariant the controller depends on
    pub fn validate(&self) -> Result<()> {
        if self.fans.is_empty() {
            return Err(FanControlError::Config(
                "At least one fan must be configured".to_string(),
            ));
        }

        let mut pins = HashSet::new();
        for (idx, fan) in self.fans.iter().enumerate() {
            if fan.hz == 0 {
                return Err(FanControlError::Config(format!(
                    "Fan {} on GPIO {} has a PWM frequency of 0 Hz",
                    idx, fan.gpio
                )));
            }
            if !pins.insert(fan.gpio) {
                return Err(FanControlError::Config(format!(
                    "GPIO {} is assigned to more than one fan",
                    fan.gpio
                )));
            }
        }

        if !(self.timeout_seconds.is_finite() && self.timeout_seconds > 0.0) {
            return Err(FanControlError::Config(format!(
                "timeout_seconds must be a positive number, got {}",
                self.timeout_seconds
            )));
        }
        Duration::try_from_secs_f64(self.timeout_seconds).map_err(|e| {
            FanControlError::Config(format!(
                "timeout_seconds {} is out of range: {}",
                self.timeout_seconds, e
            ))
        })?;

        let table = &self.temp_to_duty_cycle_thresholds;
        table.validate()?;
        if !table.is_monotonic() {
            warn!("Duty cycles decrease as temperature rises; fans will slow down when hotter");
        }

        match &self.sensor {
            SensorConfig::Vcgencmd { command } if command.is_empty() => Err(
                FanControlError::Config("Sensor command must not be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Delay between control loop ticks
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
config:
  fans:
    - gpio: 14
      hz: 100
    - gpio: 15
      hz: 25000
  temp_to_duty_cycle_thresholds:
    0: 0
    40: 30
    60.5: 60
    80: 100
  timeout_seconds: 2.5
"#;

    #[test]
    fn parses_sample_config() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(
            config.fans,
            vec![FanSpec { gpio: 14, hz: 100 }, FanSpec { gpio: 15, hz: 25000 }]
        );
        assert_eq!(config.timeout(), Duration::from_millis(2500));
        assert_eq!(config.sensor, SensorConfig::default());
        assert_eq!(config.backend, BackendKind::Rppal);
        assert_eq!(config.sensor_retries, 0);

        let temps: Vec<f32> = config
            .temp_to_duty_cycle_thresholds
            .entries()
            .iter()
            .map(|t| t.temp)
            .collect();
        assert_eq!(temps, vec![0.0, 40.0, 60.5, 80.0]);
        assert_eq!(config.temp_to_duty_cycle_thresholds.resolve(61.0).unwrap(), 60);
    }

    #[test]
    fn threshold_order_follows_the_document() {
        let yaml = r#"
config:
  fans: [{ gpio: 18, hz: 50 }]
  temp_to_duty_cycle_thresholds: { 70: 100, 0: 10, 50: 40 }
  timeout_seconds: 1
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        let duties: Vec<u8> = config.temp_to_duty_cycle_thresholds.duty_cycles().collect();
        assert_eq!(duties, vec![100, 10, 40]);
    }

    #[test]
    fn parses_optional_sections() {
        let yaml = r#"
config:
  fans: [{ gpio: 18, hz: 50 }]
  temp_to_duty_cycle_thresholds: { 0: 0 }
  timeout_seconds: 1
  sensor:
    kind: thermal_zone
  backend: simulated
  sensor_retries: 3
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(
            config.sensor,
            SensorConfig::ThermalZone {
                path: PathBuf::from("/sys/class/thermal/thermal_zone0/temp")
            }
        );
        assert_eq!(config.backend, BackendKind::Simulated);
        assert_eq!(config.sensor_retries, 3);
    }

    #[test]
    fn rejects_missing_baseline() {
        let yaml = SAMPLE.replace("    0: 0\n", "");
        let err = Config::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, FanControlError::Config(ref msg) if msg.contains("baseline")));
    }

    #[test]
    fn rejects_invalid_values() {
        for (from, to) in [
            ("timeout_seconds: 2.5", "timeout_seconds: 0"),
            ("timeout_seconds: 2.5", "timeout_seconds: -1"),
            ("hz: 100", "hz: 0"),
            ("gpio: 15", "gpio: 14"),
            ("80: 100", "80: 120"),
        ] {
            let yaml = SAMPLE.replace(from, to);
            let err = Config::from_yaml_str(&yaml).unwrap_err();
            assert!(err.is_config(), "{} -> {} gave {:?}", from, to, err);
        }
    }

    #[test]
    fn rejects_empty_fan_list() {
        let yaml = r#"
config:
  fans: []
  temp_to_duty_cycle_thresholds: { 0: 0 }
  timeout_seconds: 1
"#;
        assert!(matches!(
            Config::from_yaml_str(yaml),
            Err(FanControlError::Config(_))
        ));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(
            Config::from_yaml_str("fans: []"),
            Err(FanControlError::Yaml(_))
        ));
        let yaml = SAMPLE.replace("timeout_seconds: 2.5", "timeout_seconds: 2.5\n  colour: blue");
        assert!(matches!(
            Config::from_yaml_str(&yaml),
            Err(FanControlError::Yaml(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.fans.len(), 2);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            Config::load(&missing),
            Err(FanControlError::Io(_))
        ));
    }
}
