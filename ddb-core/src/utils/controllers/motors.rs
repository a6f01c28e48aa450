//! Motor control for a dual H-bridge motor shield.
//!
//! A shield channel is one PWM output for speed plus two bridge inputs for
//! direction. `ShieldDrive` pairs two channels into the differential drive
//! the avoidance controller commands; any other channel (e.g. cleaning
//! brushes) is owned separately and is never touched by it.
//!
//! # Examples
//!
//! ```ignore
//! let left = MotorChannel::new(pwm_a, ain1, ain2)?;
//! let right = MotorChannel::new(pwm_b, bin1, bin2)?;
//! let mut drive = ShieldDrive::new(left, right, Polarity::default());
//!
//! drive.drive(200, 200)?; // forward
//! drive.stop()?;
//! ```

use embedded_hal::{digital::OutputPin, pwm::SetDutyCycle};

use crate::utils::config::{ControllerConfig, Polarity};

/// Full-scale speed magnitude accepted by [`Motor::run`].
pub const MAX_SPEED: u16 = 255;

/// Errors that can occur when driving a motor channel.
#[derive(Debug)]
pub enum MotorError<PwmE, PinE> {
    PwmError(PwmE),
    PinError(PinE),
}

/// One bidirectional motor output.
pub trait Motor {
    type Error: core::fmt::Debug;

    /// Spin at `speed` on the 0-255 scale; the sign selects the direction.
    /// Magnitudes above 255 are clamped.
    fn run(
        &mut self,
        speed: i16,
    ) -> Result<(), Self::Error>;

    /// Cut drive current and let the motor coast.
    fn release(&mut self) -> Result<(), Self::Error>;
}

/// Logical drive contract of a two-wheeled robot.
pub trait DifferentialDrive {
    type Error: core::fmt::Debug;

    /// Drive each wheel at a signed speed, positive meaning forward rotation.
    fn drive(
        &mut self,
        left: i16,
        right: i16,
    ) -> Result<(), Self::Error>;

    /// Release both wheels without affecting any other actuator.
    fn stop(&mut self) -> Result<(), Self::Error>;
}

/// Start auxiliary channels (cleaning brushes) at the configured brush speed.
///
/// A build without `brush_speed` leaves them untouched. The channels keep
/// running until their owner releases them.
pub fn start_auxiliary<M: Motor>(
    motors: &mut [M],
    config: &ControllerConfig,
) -> Result<(), M::Error> {
    let Some(speed) = config.brush_speed else {
        return Ok(());
    };
    for motor in motors.iter_mut() {
        motor.run(speed as i16)?;
    }
    tracing::info!(speed, count = motors.len(), "auxiliary motors started");
    Ok(())
}

/// One H-bridge channel: PWM enable plus two direction inputs.
pub struct MotorChannel<P, A, B> {
    pwm: P,
    in_a: A,
    in_b: B,
    max_duty: u16,
}

impl<P, A, B, PinE> MotorChannel<P, A, B>
where
    P: SetDutyCycle,
    A: OutputPin<Error = PinE>,
    B: OutputPin<Error = PinE>,
    PinE: core::fmt::Debug,
{
    /// Wrap a PWM output and its two bridge inputs.
    ///
    /// Reads the PWM's maximum duty cycle once and leaves the channel released.
    pub fn new(
        pwm: P,
        in_a: A,
        in_b: B,
    ) -> Result<Self, MotorError<P::Error, PinE>> {
        let max_duty = pwm.max_duty_cycle();
        let mut channel = Self {
            pwm,
            in_a,
            in_b,
            max_duty,
        };
        channel.release()?;
        Ok(channel)
    }

    /// Hand back the PWM output and the bridge inputs.
    pub fn into_parts(self) -> (P, A, B) {
        (self.pwm, self.in_a, self.in_b)
    }

    fn duty_for(
        &self,
        magnitude: u16,
    ) -> u16 {
        let magnitude = magnitude.min(MAX_SPEED) as u32;
        (magnitude * self.max_duty as u32 / MAX_SPEED as u32) as u16
    }
}

impl<P, A, B, PinE> Motor for MotorChannel<P, A, B>
where
    P: SetDutyCycle,
    A: OutputPin<Error = PinE>,
    B: OutputPin<Error = PinE>,
    PinE: core::fmt::Debug,
{
    type Error = MotorError<P::Error, PinE>;

    fn run(
        &mut self,
        speed: i16,
    ) -> Result<(), Self::Error> {
        let duty = self.duty_for(speed.unsigned_abs());
        self.pwm
            .set_duty_cycle(duty)
            .map_err(MotorError::PwmError)?;
        if speed >= 0 {
            self.in_a.set_high().map_err(MotorError::PinError)?;
            self.in_b.set_low().map_err(MotorError::PinError)?;
        } else {
            self.in_a.set_low().map_err(MotorError::PinError)?;
            self.in_b.set_high().map_err(MotorError::PinError)?;
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        self.pwm
            .set_duty_cycle_fully_off()
            .map_err(MotorError::PwmError)?;
        self.in_a.set_low().map_err(MotorError::PinError)?;
        self.in_b.set_low().map_err(MotorError::PinError)
    }
}

/// Differential drive over two shield channels with per-wheel polarity.
pub struct ShieldDrive<L, R> {
    left: L,
    right: R,
    polarity: Polarity,
}

impl<L, R, E> ShieldDrive<L, R>
where
    L: Motor<Error = E>,
    R: Motor<Error = E>,
    E: core::fmt::Debug,
{
    pub fn new(
        left: L,
        right: R,
        polarity: Polarity,
    ) -> Self {
        Self {
            left,
            right,
            polarity,
        }
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Hand back the wheel motors.
    pub fn release(self) -> (L, R) {
        (self.left, self.right)
    }
}

impl<L, R, E> DifferentialDrive for ShieldDrive<L, R>
where
    L: Motor<Error = E>,
    R: Motor<Error = E>,
    E: core::fmt::Debug,
{
    type Error = E;

    fn drive(
        &mut self,
        left: i16,
        right: i16,
    ) -> Result<(), E> {
        let (left, right) = self.polarity.apply(left, right);
        self.right.run(right)?;
        self.left.run(left)
    }

    fn stop(&mut self) -> Result<(), E> {
        self.right.release()?;
        self.left.release()
    }
}
