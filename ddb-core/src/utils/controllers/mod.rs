//! Module Exports
//!
//! This file exports the hardware drivers and the obstacle-avoidance
//! controller that ties them together.
//!
//! - `motors`: H-bridge motor channels and the differential drive.
//! - `sensors`: ultrasonic rangefinder and infrared proximity switches.

pub mod motors;
pub mod sensors;

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embedded_hal::delay::DelayNs;
use serde::Serialize;

use crate::utils::{
    config::ControllerConfig,
    math::avoidance::{self, Maneuver, Phase, Side},
};
use motors::DifferentialDrive;
use sensors::{Distance, DistanceSensor, ProximitySensor};

/// Channel that receives one `TickReport` per completed tick from [`AvoidanceController::run`].
pub static TELEMETRY_CHANNEL: Channel<CriticalSectionRawMutex, TickReport, 16> = Channel::new();

/// Controller state. `Recovering` spans the whole recovery sequence, which is
/// never interrupted by new readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Cruising,
    Recovering,
}

/// What one tick saw and did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u32,
    pub reading: Distance,
    pub left_clear: bool,
    pub right_clear: bool,
    pub maneuver: Maneuver,
}

/// Errors that abort a tick.
#[derive(Debug)]
pub enum ControllerError<E: core::fmt::Debug> {
    /// The drive rejected a command; the tick stopped at that phase.
    Drive(E),
}

/// Reactive obstacle-avoidance loop for a differential-drive robot.
///
/// Owns its rangefinder, both proximity switches, the drive, and the delay
/// provider that times every phase. Each tick:
///
/// 1. drives forward for the cruise dwell,
/// 2. polls the forward range and both side switches,
/// 3. picks a maneuver with [`avoidance::decide`],
/// 4. runs the maneuver's phases to completion.
pub struct AvoidanceController<S, P, M, D> {
    range: S,
    left: P,
    right: P,
    drive: M,
    delay: D,
    config: ControllerConfig,
    mode: Mode,
    ticks: u32,
}

impl<S, P, M, D> AvoidanceController<S, P, M, D>
where
    S: DistanceSensor,
    P: ProximitySensor,
    M: DifferentialDrive,
    D: DelayNs,
{
    pub fn new(
        range: S,
        left: P,
        right: P,
        drive: M,
        delay: D,
        config: ControllerConfig,
    ) -> Self {
        Self {
            range,
            left,
            right,
            drive,
            delay,
            config,
            mode: Mode::Cruising,
            ticks: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Number of ticks started so far.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Hand back `(range, left, right, drive, delay)`.
    pub fn release(self) -> (S, P, P, M, D) {
        (self.range, self.left, self.right, self.drive, self.delay)
    }

    /// Run one complete tick: advance, poll, decide, act.
    pub fn tick(&mut self) -> Result<TickReport, ControllerError<M::Error>> {
        self.ticks = self.ticks.wrapping_add(1);
        self.execute(avoidance::advance(&self.config))?;

        let reading = self.range.measure();
        let left_clear = Self::read_side(&mut self.left, Side::Left);
        let right_clear = Self::read_side(&mut self.right, Side::Right);
        let maneuver = avoidance::decide(
            reading,
            left_clear,
            right_clear,
            self.config.obstacle_threshold_cm,
        );
        tracing::debug!(
            tick = self.ticks,
            ?reading,
            left_clear,
            right_clear,
            ?maneuver,
            "sensor poll"
        );

        match maneuver {
            Maneuver::Recover => {
                self.set_mode(Mode::Recovering);
                let result = self.execute_plan(maneuver);
                self.set_mode(Mode::Cruising);
                result?;
            }
            Maneuver::Evade(side) => {
                tracing::info!(?side, "side obstacle, pivoting away");
                self.execute_plan(maneuver)?;
            }
            Maneuver::Cruise => {}
        }

        Ok(TickReport {
            tick: self.ticks,
            reading,
            left_clear,
            right_clear,
            maneuver,
        })
    }

    /// Tick repeatedly, publishing each report to [`TELEMETRY_CHANNEL`].
    ///
    /// `None` runs until power-off. Drive failures are logged and the next
    /// tick retries from scratch; a full telemetry channel drops the report.
    pub async fn run(
        &mut self,
        ticks: Option<u32>,
    ) {
        let mut remaining = ticks;
        while remaining != Some(0) {
            match self.tick() {
                Ok(report) => {
                    if TELEMETRY_CHANNEL.try_send(report).is_err() {
                        tracing::trace!(tick = report.tick, "telemetry full, report dropped");
                    }
                }
                Err(e) => tracing::error!("tick {} failed: {:?}", self.ticks, e),
            }
            remaining = remaining.map(|n| n - 1);
            embassy_futures::yield_now().await;
        }
    }

    fn read_side(
        sensor: &mut P,
        side: Side,
    ) -> bool {
        sensor.is_clear().unwrap_or_else(|error| {
            tracing::warn!(?side, ?error, "proximity read failed, assuming clear");
            true
        })
    }

    fn set_mode(
        &mut self,
        mode: Mode,
    ) {
        if self.mode != mode {
            tracing::info!(from = ?self.mode, to = ?mode, "mode change");
            self.mode = mode;
        }
    }

    fn execute_plan(
        &mut self,
        maneuver: Maneuver,
    ) -> Result<(), ControllerError<M::Error>> {
        for phase in maneuver.plan(&self.config) {
            self.execute(phase)?;
        }
        Ok(())
    }

    /// Issue a phase's command, then block for its hold.
    fn execute(
        &mut self,
        phase: Phase,
    ) -> Result<(), ControllerError<M::Error>> {
        let issued = match phase.command.wheel_speeds() {
            Some((left, right)) => self.drive.drive(left, right),
            None => self.drive.stop(),
        };
        issued.map_err(ControllerError::Drive)?;

        let hold_ms = phase.hold.as_millis() as u32;
        if hold_ms > 0 {
            self.delay.delay_ms(hold_ms);
        }
        Ok(())
    }
}
