//! Obstacle-avoidance policy for a differential-drive bot.
//!
//! `decide` maps one tick's sensor readings to a [`Maneuver`] using a fixed
//! priority order, and [`Maneuver::plan`] expands that maneuver into the timed
//! drive phases the controller executes.
//!
//! # Example
//! ```rust
//! use ddb_core::utils::controllers::sensors::Distance;
//! use ddb_core::utils::math::avoidance::{decide, Maneuver, Side};
//!
//! let m = decide(Distance::Centimeters(100.0), false, true, 20.0);
//! assert_eq!(m, Maneuver::Evade(Side::Left));
//! ```

use embassy_time::Duration;
use heapless::Vec;
use serde::Serialize;

use crate::utils::{config::ControllerConfig, controllers::sensors::Distance};

/// Most phases any maneuver expands to.
pub const MAX_PHASES: usize = 4;

/// Timed drive phases of one maneuver, in execution order.
pub type Plan = Vec<Phase, MAX_PHASES>;

/// Side of the robot a proximity sensor watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// What the robot does for the rest of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Maneuver {
    /// Nothing in the way: keep driving forward.
    Cruise,
    /// An obstacle on the given side: pivot away from it.
    Evade(Side),
    /// An obstacle dead ahead: stop, back off, and turn right.
    Recover,
}

/// A single locomotion command. Speeds are magnitudes on the 0-255 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveCommand {
    Forward(u8),
    Backward(u8),
    /// Pivot in place counter-clockwise.
    TurnLeft(u8),
    /// Pivot in place clockwise.
    TurnRight(u8),
    /// Release drive current on both wheels.
    Stop,
}

impl DriveCommand {
    /// Logical `(left, right)` wheel speeds, positive meaning forward rotation.
    ///
    /// Returns `None` for `Stop`, which releases the wheels instead of driving them.
    pub fn wheel_speeds(&self) -> Option<(i16, i16)> {
        match *self {
            DriveCommand::Forward(s) => Some((s as i16, s as i16)),
            DriveCommand::Backward(s) => Some((-(s as i16), -(s as i16))),
            DriveCommand::TurnLeft(s) => Some((-(s as i16), s as i16)),
            DriveCommand::TurnRight(s) => Some((s as i16, -(s as i16))),
            DriveCommand::Stop => None,
        }
    }
}

/// A drive command held for a fixed duration before the next one is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub command: DriveCommand,
    pub hold: Duration,
}

impl Phase {
    pub const fn new(
        command: DriveCommand,
        hold: Duration,
    ) -> Self {
        Self { command, hold }
    }
}

/// Pick the maneuver for one tick. First match wins:
///
/// 1. forward reading strictly below `threshold_cm` → [`Maneuver::Recover`]
/// 2. left sensor blocked → [`Maneuver::Evade`]`(Left)`
/// 3. right sensor blocked → [`Maneuver::Evade`]`(Right)`
/// 4. otherwise → [`Maneuver::Cruise`]
///
/// An `Unknown` forward reading never satisfies rule 1. A timed-out or
/// disconnected sensor therefore cannot trigger an endless string of
/// recoveries; the side sensors still steer the robot.
pub fn decide(
    reading: Distance,
    left_clear: bool,
    right_clear: bool,
    threshold_cm: f32,
) -> Maneuver {
    match reading {
        Distance::Centimeters(cm) if cm < threshold_cm => Maneuver::Recover,
        _ if !left_clear => Maneuver::Evade(Side::Left),
        _ if !right_clear => Maneuver::Evade(Side::Right),
        _ => Maneuver::Cruise,
    }
}

/// The forward phase every tick opens with, ahead of the sensor poll.
pub fn advance(cfg: &ControllerConfig) -> Phase {
    Phase::new(DriveCommand::Forward(cfg.cruise_speed), cfg.cruise_dwell())
}

impl Maneuver {
    /// Expand into timed drive phases.
    ///
    /// `Cruise` is empty because the forward command is already active from
    /// [`advance`]. The recovery turn is always to the right.
    pub fn plan(
        &self,
        cfg: &ControllerConfig,
    ) -> Plan {
        match self {
            Maneuver::Cruise => Plan::new(),
            Maneuver::Evade(Side::Left) => {
                [Phase::new(DriveCommand::TurnRight(cfg.cruise_speed), cfg.evade_turn())]
                    .into_iter()
                    .collect()
            }
            Maneuver::Evade(Side::Right) => {
                [Phase::new(DriveCommand::TurnLeft(cfg.cruise_speed), cfg.evade_turn())]
                    .into_iter()
                    .collect()
            }
            Maneuver::Recover => [
                Phase::new(DriveCommand::Stop, cfg.recovery_stop()),
                Phase::new(DriveCommand::Backward(cfg.recovery_speed), cfg.recovery_reverse()),
                Phase::new(DriveCommand::TurnRight(cfg.recovery_speed), cfg.recovery_turn()),
                Phase::new(DriveCommand::Forward(cfg.cruise_speed), Duration::from_millis(0)),
            ]
            .into_iter()
            .collect(),
        }
    }
}
