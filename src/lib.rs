//! Raspberry Pi fan controller
//!
//! Reads the CPU temperature on a fixed interval and drives every configured
//! PWM fan to the duty cycle selected by a threshold table.

pub mod args;
pub mod config;
pub mod cpu_temp;
pub mod daemon;
pub mod errors;
pub mod fan;
pub mod fan_control;
pub mod gpio;
pub mod logging;

// Re-export commonly used types
pub use config::{Config, FanSpec};
pub use daemon::{Controller, SweepMode, SweepReport};
pub use errors::{FanControlError, Result};
pub use fan::{Threshold, ThresholdTable};
pub use fan_control::{FanArray, FanHandle};
