//! Control loop driving the fans from the temperature sensor

use crate::{
    config::Config,
    cpu_temp::{self, TemperatureSource},
    errors::Result,
    fan_control::FanArray,
    gpio,
};
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

mod sweep;
pub use sweep::{SweepMode, SweepReport};

/// Pause between sensor read attempts when `sensor_retries` is set
const SENSOR_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Result of one control loop iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub temperature: f32,
    pub duty_cycle: u8,
}

/// Owns the sensor and the fans and runs either the control loop or the
/// diagnostic sweep
pub struct Controller {
    config: Config,
    sensor: Box<dyn TemperatureSource>,
    fans: FanArray,
}

impl Controller {
    pub fn new(config: Config, sensor: Box<dyn TemperatureSource>, fans: FanArray) -> Self {
        Self {
            config,
            sensor,
            fans,
        }
    }

    /// Claim the configured fans and build the configured sensor
    pub fn from_config(config: Config) -> Result<Self> {
        let mut backend = gpio::from_config(config.backend)?;
        let fans = FanArray::initialize(backend.as_mut(), &config.fans)?;
        let sensor = cpu_temp::from_config(&config.sensor);
        Ok(Self::new(config, sensor, fans))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fans(&self) -> &FanArray {
        &self.fans
    }

    /// Run the control loop until `cancel` fires or a tick fails
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        info!(
            "Controlling {} fan(s), polling every {:?}",
            self.fans.len(),
            self.config.timeout()
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.tick().await?;
            if !pause(cancel, self.config.timeout()).await {
                break;
            }
        }

        info!("Control loop stopped");
        Ok(())
    }

    /// Sample the temperature, resolve the duty cycle and apply it to every fan
    pub async fn tick(&mut self) -> Result<Tick> {
        let temperature = self.sample().await?;
        debug!("Current temperature {}°C", temperature);

        let duty_cycle = self
            .config
            .temp_to_duty_cycle_thresholds
            .resolve(temperature)
            .map_err(|e| {
                error!("No duty cycle for {}°C: {}", temperature, e);
                e
            })?;

        self.fans.set_all(f64::from(duty_cycle)).map_err(|e| {
            error!("Failed to apply {}% duty cycle: {}", duty_cycle, e);
            e
        })?;

        Ok(Tick {
            temperature,
            duty_cycle,
        })
    }

    async fn sample(&mut self) -> Result<f32> {
        let retries = self.config.sensor_retries;
        let mut attempt = 0;
        loop {
            match self.sensor.read().await {
                Ok(temp) => return Ok(temp),
                Err(e) if attempt < retries => {
                    attempt += 1;
                    warn!("Temperature read failed ({}), retry {}/{}", e, attempt, retries);
                    sleep(SENSOR_RETRY_DELAY).await;
                }
                Err(e) => {
                    error!("Temperature read failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    /// Stop and release every fan
    pub fn shutdown(&mut self) -> Result<()> {
        self.fans.shutdown()
    }
}

/// Sleep for `duration`, returning false if cancelled first
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

/// Cancel `cancel` on SIGINT or SIGTERM.
///
/// The handlers are registered before this returns, so a signal that
/// arrives while the first tick is still running is not lost. Must be
/// called from inside the runtime.
#[cfg(unix)]
pub fn listen_for_signals(cancel: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        info!("Received {}, stopping", name);
        cancel.cancel();
    }))
}

#[cfg(windows)]
pub fn listen_for_signals(cancel: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;

    Ok(tokio::spawn(async move {
        ctrl_c.recv().await;
        info!("Received Ctrl-C, stopping");
        cancel.cancel();
    }))
}
