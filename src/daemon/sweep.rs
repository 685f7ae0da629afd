//! Diagnostic sweep for checking pinout and wiring

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use super::{pause, Controller};
use crate::errors::Result;

/// Whether the sweep drives the fans or only walks through the steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepMode {
    /// Sleep and log each step, leave the fans alone
    #[default]
    DryRun,
    /// Apply each duty cycle, then turn the fan back off
    Actuate,
}

/// Outcome of a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Timed steps performed
    pub steps: usize,
    /// False when the sweep was cancelled part way
    pub completed: bool,
}

impl Controller {
    /// Ramp each fan in turn through every duty cycle of the threshold table.
    ///
    /// Duty cycles are visited in configuration order and every step waits
    /// `timeout_seconds` first.
    pub async fn sweep(
        &mut self,
        cancel: &CancellationToken,
        mode: SweepMode,
    ) -> Result<SweepReport> {
        info!("Running in test mode ({:?})", mode);

        let timeout = self.config.timeout();
        let duty_cycles: Vec<u8> = self
            .config
            .temp_to_duty_cycle_thresholds
            .duty_cycles()
            .collect();
        let mut report = SweepReport::default();

        for fan in 0..self.fans.len() {
            for &duty in &duty_cycles {
                if !pause(cancel, timeout).await {
                    info!("Test sweep cancelled after {} step(s)", report.steps);
                    return Ok(report);
                }
                debug!("Changing fan {} to {}%", fan, duty);
                if mode == SweepMode::Actuate {
                    self.fans.set_duty_cycle(fan, f64::from(duty))?;
                }
                report.steps += 1;
            }
            if mode == SweepMode::Actuate {
                self.fans.set_duty_cycle(fan, 0.0)?;
            }
        }

        report.completed = true;
        info!("Test sweep finished, {} step(s)", report.steps);
        Ok(report)
    }
}
