//! Obstacle sensors for the differential-drive bot.
//!
//! Provides the forward ultrasonic rangefinder (HC-SR04 style trigger/echo
//! pair) and the two side-facing infrared proximity switches, each behind a
//! small trait so the controller can be driven by fakes in tests.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use serde::Serialize;

use crate::utils::config::{ControllerConfig, DEFAULT_ECHO_TIMEOUT_US};

/// Echo round-trip time per centimetre of range, in microseconds.
pub const US_PER_CM: f32 = 58.82;
/// Polling step while waiting on an echo edge.
pub const ECHO_POLL_US: u32 = 10;

/// A forward range reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    Centimeters(f32),
    /// No usable echo: the sensor timed out, is disconnected, or returned a
    /// zero-width pulse. Never to be read as "obstacle at 0 cm".
    Unknown,
}

impl Distance {
    /// Convert an echo pulse width to a distance.
    pub fn from_echo_us(width_us: u32) -> Self {
        if width_us == 0 {
            Distance::Unknown
        } else {
            Distance::Centimeters(width_us as f32 / US_PER_CM)
        }
    }

    pub fn centimeters(&self) -> Option<f32> {
        match *self {
            Distance::Centimeters(cm) => Some(cm),
            Distance::Unknown => None,
        }
    }
}

/// Errors that can occur while reading a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The echo edge never arrived within the timeout.
    Timeout,
    /// The pin driver reported an error.
    Disconnected,
}

/// A forward-facing rangefinder.
pub trait DistanceSensor {
    /// Fire a ranging pulse.
    fn trigger(&mut self) -> Result<(), SensorError>;

    /// Wait for the echo of the last trigger and return its width in microseconds.
    fn read_echo(&mut self) -> Result<u32, SensorError>;

    /// Trigger and read one range. Every failure becomes [`Distance::Unknown`].
    fn measure(&mut self) -> Distance {
        match self.trigger().and_then(|()| self.read_echo()) {
            Ok(width_us) => Distance::from_echo_us(width_us),
            Err(error) => {
                tracing::warn!(?error, "range reading unavailable");
                Distance::Unknown
            }
        }
    }
}

/// A binary obstacle switch watching one side of the robot.
pub trait ProximitySensor {
    /// `true` when no obstacle is present.
    fn is_clear(&mut self) -> Result<bool, SensorError>;
}

/// HC-SR04 ultrasonic rangefinder on a trigger output and an echo input.
///
/// The echo is timed by polling with the delay provider at [`ECHO_POLL_US`]
/// steps, so resolution is about 0.17 cm and no hardware timer is needed.
pub struct HcSr04<Trig, Echo, D> {
    trig: Trig,
    echo: Echo,
    delay: D,
    timeout_us: u32,
}

impl<Trig, Echo, D> HcSr04<Trig, Echo, D>
where
    Trig: OutputPin,
    Echo: InputPin,
    D: DelayNs,
{
    /// Create a sensor with the default echo timeout.
    pub fn new(
        trig: Trig,
        echo: Echo,
        delay: D,
    ) -> Self {
        Self::with_timeout(trig, echo, delay, DEFAULT_ECHO_TIMEOUT_US)
    }

    /// Create a sensor that gives up on each echo edge after `timeout_us`.
    pub fn with_timeout(
        trig: Trig,
        echo: Echo,
        delay: D,
        timeout_us: u32,
    ) -> Self {
        Self {
            trig,
            echo,
            delay,
            timeout_us,
        }
    }

    /// Create a sensor bounded by the configured `echo_timeout_us`.
    pub fn from_config(
        trig: Trig,
        echo: Echo,
        delay: D,
        config: &ControllerConfig,
    ) -> Self {
        Self::with_timeout(trig, echo, delay, config.echo_timeout_us)
    }

    /// Hand back the pins and delay provider.
    pub fn release(self) -> (Trig, Echo, D) {
        (self.trig, self.echo, self.delay)
    }

    /// Poll the echo line until it reads `high`, returning the elapsed time.
    fn wait_for_level(
        &mut self,
        high: bool,
    ) -> Result<u32, SensorError> {
        let mut elapsed = 0;
        loop {
            if self.echo.is_high().map_err(|_| SensorError::Disconnected)? == high {
                return Ok(elapsed);
            }
            if elapsed >= self.timeout_us {
                return Err(SensorError::Timeout);
            }
            self.delay.delay_us(ECHO_POLL_US);
            elapsed += ECHO_POLL_US;
        }
    }
}

impl<Trig, Echo, D> DistanceSensor for HcSr04<Trig, Echo, D>
where
    Trig: OutputPin,
    Echo: InputPin,
    D: DelayNs,
{
    fn trigger(&mut self) -> Result<(), SensorError> {
        self.trig.set_low().map_err(|_| SensorError::Disconnected)?;
        self.delay.delay_us(2);
        self.trig.set_high().map_err(|_| SensorError::Disconnected)?;
        self.delay.delay_us(10);
        self.trig.set_low().map_err(|_| SensorError::Disconnected)
    }

    fn read_echo(&mut self) -> Result<u32, SensorError> {
        self.wait_for_level(true)?;
        self.wait_for_level(false)
    }
}

/// Digital infrared proximity switch. Active-low: the output is pulled low
/// while an obstacle reflects the beam.
pub struct IrProximity<P> {
    pin: P,
}

impl<P: InputPin> IrProximity<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: InputPin> ProximitySensor for IrProximity<P> {
    fn is_clear(&mut self) -> Result<bool, SensorError> {
        // High means nothing in front of the emitter.
        self.pin.is_high().map_err(|_| SensorError::Disconnected)
    }
}
