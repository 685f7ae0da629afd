//! Command line argument parsing for the fan controller

use clap::Parser;
use std::path::PathBuf;

use crate::daemon::SweepMode;

/// Raspberry Pi PWM fan controller
///
/// Polls the CPU temperature and drives every configured fan to the duty
/// cycle selected by the threshold table.
#[derive(Parser, Debug)]
#[command(name = "pi-fan-control")]
#[command(about = "Threshold based PWM fan controller")]
#[command(version)]
pub struct Args {
    /// Verbosity of logging: 0-off, 1-error, 2-warning, 3-info, 4-debug
    #[arg(short = 'v', value_parser = clap::value_parser!(u8).range(0..=4), default_value_t = 4)]
    pub verbosity: u8,

    /// Sweep every fan through every duty cycle once, then exit
    #[arg(long)]
    pub test: bool,

    /// Apply duty cycles during the test sweep instead of only logging them
    #[arg(long, requires = "test")]
    pub actuate: bool,

    /// Config file
    #[arg(long, default_value = "config.yaml")]
    pub conf: PathBuf,
}

impl Args {
    /// Sweep mode selected by the flags
    pub fn sweep_mode(&self) -> SweepMode {
        if self.actuate {
            SweepMode::Actuate
        } else {
            SweepMode::DryRun
        }
    }
}
