//! Math utilities for the differential-drive bot.
//!
//! This module provides the pure obstacle-avoidance policy: sensor readings in,
//! a maneuver and its timed drive phases out.

pub mod avoidance;
