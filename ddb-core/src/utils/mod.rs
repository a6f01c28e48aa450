//! Utility re-exports and helper macros for the differential-drive bot.
//!
//! This module re-exports the controller, drivers, decision policy, and
//! configuration:
//!
//! - `config`: tunable thresholds, speeds, hold durations and robot profiles
//! - `controllers`: the avoidance controller plus sensor and motor drivers
//! - `math`: the pure obstacle-avoidance decision policy
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod config;
pub mod controllers;
pub mod math;

pub use config::{ControllerConfig, Polarity, Profile};
pub use controllers::{AvoidanceController, Mode, TickReport, TELEMETRY_CHANNEL};
pub use embassy_time::Duration;
pub use math::avoidance::{decide, DriveCommand, Maneuver, Side};

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
