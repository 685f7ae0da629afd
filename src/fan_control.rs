use crate::config::FanSpec;
use crate::errors::{FanControlError, Result};
use crate::gpio::{PwmBackend, PwmChannel};
use log::{debug, error, info};

/// A running PWM channel bound to one configured fan
pub struct FanHandle {
    index: usize,
    spec: FanSpec,
    channel: Box<dyn PwmChannel>,
    duty: f64,
}

impl FanHandle {
    /// Position of the fan in the configuration
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn spec(&self) -> &FanSpec {
        &self.spec
    }

    /// Last duty cycle applied, in percent
    pub fn duty_cycle(&self) -> f64 {
        self.duty
    }

    /// Set fan duty cycle as percentage (0-100)
    pub fn set_duty_cycle(&mut self, percent: f64) -> Result<()> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(FanControlError::HardwareWrite {
                fan: self.index,
                reason: format!("duty cycle {}% is outside 0-100%", percent),
            });
        }

        self.channel.set_duty_cycle(percent)?;
        self.duty = percent;
        debug!("Changed fan {} (GPIO {}) to {}%", self.index, self.spec.gpio, percent);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.channel.stop()?;
        self.duty = 0.0;
        Ok(())
    }
}

/// Owns every fan channel for the lifetime of the controller.
///
/// Channels are stopped and released by [`FanArray::shutdown`], which also
/// runs on drop.
pub struct FanArray {
    handles: Vec<FanHandle>,
    shut_down: bool,
}

impl FanArray {
    /// Claim every configured fan and start it at 0% duty cycle.
    ///
    /// If any fan fails, the ones already claimed are released again.
    pub fn initialize<B>(backend: &mut B, fans: &[FanSpec]) -> Result<Self>
    where
        B: PwmBackend + ?Sized,
    {
        info!("Initializing {} fan(s)...", fans.len());

        let mut array = Self {
            handles: Vec::with_capacity(fans.len()),
            shut_down: false,
        };

        for (index, spec) in fans.iter().enumerate() {
            let channel = backend.open(index, spec).map_err(|e| {
                error!("Fan {} on GPIO {} could not be initialized: {}", index, spec.gpio, e);
                e
            })?;
            info!(
                "{} Fan {} on GPIO {} running at {} Hz",
                crate::logging::SUCCESS_GLYPH,
                index,
                spec.gpio,
                spec.hz
            );
            array.handles.push(FanHandle {
                index,
                spec: *spec,
                channel,
                duty: 0.0,
            });
        }

        Ok(array)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn handles(&self) -> &[FanHandle] {
        &self.handles
    }

    /// Apply a duty cycle to a single fan
    pub fn set_duty_cycle(&mut self, fan: usize, percent: f64) -> Result<()> {
        if self.shut_down {
            return Err(FanControlError::ShutDown);
        }
        self.handles
            .get_mut(fan)
            .ok_or_else(|| FanControlError::HardwareWrite {
                fan,
                reason: "no such fan".to_string(),
            })?
            .set_duty_cycle(percent)
    }

    /// Apply the same duty cycle to every fan, in configured order
    pub fn set_all(&mut self, percent: f64) -> Result<()> {
        if self.shut_down {
            return Err(FanControlError::ShutDown);
        }
        self.handles
            .iter_mut()
            .try_for_each(|handle| handle.set_duty_cycle(percent))
    }

    /// Stop every channel and release its pin.
    ///
    /// Every fan is attempted even if one fails; the first error is returned.
    /// Calling it again is a no-op.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        let mut first_err = None;
        for handle in self.handles.iter_mut() {
            if let Err(e) = handle.stop() {
                error!("Failed to stop fan {}: {}", handle.index, e);
                first_err.get_or_insert(e);
            }
        }
        let released = self.handles.len();
        self.handles.clear();
        info!("Stopped and released {} fan(s)", released);

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for FanArray {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Fan shutdown failed: {}", e);
        }
    }
}
