//! Obstacle-avoidance control and drivers for differential-drive bots on no-std embedded platforms.
//!
//! For a runnable host simulation, see the `ddb-app/mock-mcu` crate.
#![no_std]

pub mod utils;
