//! PWM backends behind the fan actuator

use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{BackendKind, FanSpec};
use crate::errors::{FanControlError, Result};

/// A claimed output pin producing a PWM signal
pub trait PwmChannel {
    /// Apply a duty cycle in percent (0-100)
    fn set_duty_cycle(&mut self, percent: f64) -> Result<()>;

    /// Stop the signal, leaving the output low
    fn stop(&mut self) -> Result<()>;
}

/// Hands out PWM channels. The channel releases its pin when dropped.
pub trait PwmBackend {
    /// Claim the fan's pin as an output and start PWM at 0% duty cycle
    fn open(&mut self, index: usize, spec: &FanSpec) -> Result<Box<dyn PwmChannel>>;
}

/// Build the backend selected in the configuration
pub fn from_config(kind: BackendKind) -> Result<Box<dyn PwmBackend>> {
    match kind {
        BackendKind::Rppal => rppal_backend(),
        BackendKind::Simulated => Ok(Box::new(SimulatedBackend::new())),
    }
}

#[cfg(target_os = "linux")]
fn rppal_backend() -> Result<Box<dyn PwmBackend>> {
    Ok(Box::new(rpi::RppalBackend))
}

#[cfg(not(target_os = "linux"))]
fn rppal_backend() -> Result<Box<dyn PwmBackend>> {
    Err(FanControlError::Config(
        "The rppal backend is only available on Linux; use `backend: simulated`".to_string(),
    ))
}

#[cfg(target_os = "linux")]
pub mod rpi {
    //! Software PWM on the GPIO header, BCM pin numbering

    use super::{PwmBackend, PwmChannel};
    use crate::config::FanSpec;
    use crate::errors::{FanControlError, Result};
    use rppal::gpio::{Gpio, OutputPin};

    pub struct RppalBackend;

    impl PwmBackend for RppalBackend {
        fn open(&mut self, index: usize, spec: &FanSpec) -> Result<Box<dyn PwmChannel>> {
            let init_err = |e: rppal::gpio::Error| FanControlError::HardwareInit {
                gpio: spec.gpio,
                reason: e.to_string(),
            };

            let mut pin = Gpio::new()
                .map_err(init_err)?
                .get(spec.gpio)
                .map_err(init_err)?
                .into_output_low();
            pin.set_pwm_frequency(f64::from(spec.hz), 0.0)
                .map_err(init_err)?;

            Ok(Box::new(RppalChannel {
                index,
                hz: f64::from(spec.hz),
                pin,
            }))
        }
    }

    struct RppalChannel {
        index: usize,
        hz: f64,
        pin: OutputPin,
    }

    impl RppalChannel {
        fn write_err(&self, e: rppal::gpio::Error) -> FanControlError {
            FanControlError::HardwareWrite {
                fan: self.index,
                reason: e.to_string(),
            }
        }
    }

    impl PwmChannel for RppalChannel {
        fn set_duty_cycle(&mut self, percent: f64) -> Result<()> {
            self.pin
                .set_pwm_frequency(self.hz, percent / 100.0)
                .map_err(|e| self.write_err(e))
        }

        fn stop(&mut self) -> Result<()> {
            self.pin.clear_pwm().map_err(|e| self.write_err(e))?;
            self.pin.set_low();
            Ok(())
        }
    }
}

/// State of one pin on the simulated board
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedPin {
    pub hz: u32,
    pub duty: f64,
    pub running: bool,
    /// Every duty cycle written since the pin was claimed
    pub history: Vec<f64>,
}

#[derive(Debug, Default)]
struct Board {
    pins: HashMap<u8, SimulatedPin>,
    disconnected: Vec<u8>,
}

/// In-memory backend for hosts without GPIO.
///
/// Clones share one board, so a clone kept outside the fan array can
/// inspect what the controller did.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    board: Arc<Mutex<Board>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn board(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of a claimed pin
    pub fn pin(&self, gpio: u8) -> Option<SimulatedPin> {
        self.board().pins.get(&gpio).cloned()
    }

    pub fn is_claimed(&self, gpio: u8) -> bool {
        self.board().pins.contains_key(&gpio)
    }

    /// Current duty cycle of a claimed pin
    pub fn duty_cycle(&self, gpio: u8) -> Option<f64> {
        self.pin(gpio).map(|p| p.duty)
    }

    /// Make every later write to `gpio` fail, as if the wiring came loose
    pub fn disconnect(&self, gpio: u8) {
        self.board().disconnected.push(gpio);
    }
}

impl PwmBackend for SimulatedBackend {
    fn open(&mut self, index: usize, spec: &FanSpec) -> Result<Box<dyn PwmChannel>> {
        let mut board = self.board();
        if board.pins.contains_key(&spec.gpio) {
            return Err(FanControlError::HardwareInit {
                gpio: spec.gpio,
                reason: "pin is already in use".to_string(),
            });
        }

        board.pins.insert(
            spec.gpio,
            SimulatedPin {
                hz: spec.hz,
                duty: 0.0,
                running: true,
                history: Vec::new(),
            },
        );
        debug!("Simulated PWM on GPIO {} at {} Hz", spec.gpio, spec.hz);

        Ok(Box::new(SimulatedChannel {
            index,
            gpio: spec.gpio,
            board: Arc::clone(&self.board),
        }))
    }
}

struct SimulatedChannel {
    index: usize,
    gpio: u8,
    board: Arc<Mutex<Board>>,
}

impl SimulatedChannel {
    fn update(&self, f: impl FnOnce(&mut SimulatedPin)) -> Result<()> {
        let mut board = self.board.lock().unwrap_or_else(PoisonError::into_inner);
        if board.disconnected.contains(&self.gpio) {
            return Err(FanControlError::HardwareWrite {
                fan: self.index,
                reason: format!("GPIO {} is disconnected", self.gpio),
            });
        }
        let pin = board
            .pins
            .get_mut(&self.gpio)
            .ok_or_else(|| FanControlError::HardwareWrite {
                fan: self.index,
                reason: format!("GPIO {} is not claimed", self.gpio),
            })?;
        f(pin);
        Ok(())
    }
}

impl PwmChannel for SimulatedChannel {
    fn set_duty_cycle(&mut self, percent: f64) -> Result<()> {
        self.update(|pin| {
            pin.duty = percent;
            pin.history.push(percent);
        })
    }

    fn stop(&mut self) -> Result<()> {
        self.update(|pin| {
            pin.duty = 0.0;
            pin.running = false;
        })
    }
}

impl Drop for SimulatedChannel {
    fn drop(&mut self) {
        let mut board = self.board.lock().unwrap_or_else(PoisonError::into_inner);
        board.pins.remove(&self.gpio);
    }
}
