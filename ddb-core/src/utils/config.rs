//! Controller configuration for the differential-drive bot.
//!
//! Every tunable the avoidance loop reads lives in `ControllerConfig`: drive
//! speeds, the forward obstacle threshold, the hold duration of each maneuver
//! phase, the echo timeout of the distance sensor, and the wiring polarity of
//! the wheel motors. Values are fixed at startup and read-only afterwards.
//!
//! Serialized as JSON with every field optional; missing fields fall back to
//! the defaults below.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

/// Default drive speed for both wheels (0-255 duty scale).
pub const DEFAULT_SPEED: u8 = 200;
/// Default forward distance below which the recovery maneuver runs.
pub const DEFAULT_THRESHOLD_CM: f32 = 20.0;
/// Default upper bound on each echo wait of the distance sensor.
pub const DEFAULT_ECHO_TIMEOUT_US: u32 = 30_000;

/// Per-wheel motor wiring polarity.
///
/// Two otherwise identical robots can be wired so that the same logical
/// command spins a wheel in opposite directions; an inverted wheel has its
/// signed speed negated before it reaches the motor channel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Polarity {
    pub invert_left: bool,
    pub invert_right: bool,
}

impl Polarity {
    /// Map logical wheel speeds to physical ones.
    pub fn apply(
        &self,
        left: i16,
        right: i16,
    ) -> (i16, i16) {
        let flip = |speed: i16, inverted: bool| if inverted { speed.saturating_neg() } else { speed };
        (flip(left, self.invert_left), flip(right, self.invert_right))
    }
}

/// Known robot builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Four-motor vacuum: wheels on M2/M3 with the left one wired inverted,
    /// cleaning brushes on M1/M4.
    Vacuum,
    /// Plain two-motor rover at a slower speed, straight wiring.
    Rover,
}

/// Errors reported by [`ControllerConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// The obstacle threshold is not a finite positive distance.
    InvalidThreshold(f32),
    /// The cruise speed is zero, so the robot would never move.
    ZeroCruiseSpeed,
    /// The recovery speed is zero, so the robot could never back away.
    ZeroRecoverySpeed,
}

impl core::fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        match self {
            ConfigError::InvalidThreshold(cm) => {
                write!(f, "obstacle threshold must be a positive distance, got {cm} cm")
            }
            ConfigError::ZeroCruiseSpeed => f.write_str("cruise speed must be non-zero"),
            ConfigError::ZeroRecoverySpeed => f.write_str("recovery speed must be non-zero"),
        }
    }
}

/// Tunables for the obstacle-avoidance controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Speed used while cruising and for side evasions.
    pub cruise_speed: u8,
    /// Speed used for the reverse and turn phases of a recovery.
    pub recovery_speed: u8,
    /// Forward distance (cm) that triggers a recovery; the comparison is strict.
    pub obstacle_threshold_cm: f32,
    /// Forward dwell between issuing the cruise command and polling the sensors.
    pub cruise_dwell_ms: u32,
    /// Pivot duration when a side sensor reports an obstacle.
    pub evade_turn_ms: u32,
    /// Recovery phase 1: locomotion stopped.
    pub recovery_stop_ms: u32,
    /// Recovery phase 2: reversing.
    pub recovery_reverse_ms: u32,
    /// Recovery phase 3: pivoting right.
    pub recovery_turn_ms: u32,
    /// Upper bound on each echo edge wait of the distance sensor.
    pub echo_timeout_us: u32,
    pub polarity: Polarity,
    /// Speed of the auxiliary brush motors, if the build has them.
    pub brush_speed: Option<u8>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cruise_speed: DEFAULT_SPEED,
            recovery_speed: DEFAULT_SPEED,
            obstacle_threshold_cm: DEFAULT_THRESHOLD_CM,
            cruise_dwell_ms: 80,
            evade_turn_ms: 500,
            recovery_stop_ms: 500,
            recovery_reverse_ms: 600,
            recovery_turn_ms: 800,
            echo_timeout_us: DEFAULT_ECHO_TIMEOUT_US,
            polarity: Polarity::default(),
            brush_speed: None,
        }
    }
}

impl ControllerConfig {
    /// Configuration matching one of the known robot builds.
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Vacuum => Self {
                polarity: Polarity {
                    invert_left: true,
                    invert_right: false,
                },
                brush_speed: Some(180),
                ..Self::default()
            },
            Profile::Rover => Self {
                cruise_speed: 150,
                recovery_speed: 150,
                ..Self::default()
            },
        }
    }

    /// Reject configurations the controller cannot act on sensibly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.obstacle_threshold_cm;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        if self.cruise_speed == 0 {
            return Err(ConfigError::ZeroCruiseSpeed);
        }
        if self.recovery_speed == 0 {
            return Err(ConfigError::ZeroRecoverySpeed);
        }
        Ok(())
    }

    pub fn cruise_dwell(&self) -> Duration {
        Duration::from_millis(self.cruise_dwell_ms as u64)
    }

    pub fn evade_turn(&self) -> Duration {
        Duration::from_millis(self.evade_turn_ms as u64)
    }

    pub fn recovery_stop(&self) -> Duration {
        Duration::from_millis(self.recovery_stop_ms as u64)
    }

    pub fn recovery_reverse(&self) -> Duration {
        Duration::from_millis(self.recovery_reverse_ms as u64)
    }

    pub fn recovery_turn(&self) -> Duration {
        Duration::from_millis(self.recovery_turn_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_reference_timings() {
        let cfg = ControllerConfig::default();
        assert_eq!(cfg.obstacle_threshold_cm, 20.0);
        assert_eq!(cfg.cruise_dwell().as_millis(), 80);
        assert_eq!(cfg.evade_turn().as_millis(), 500);
        assert_eq!(cfg.recovery_stop().as_millis(), 500);
        assert_eq!(cfg.recovery_reverse().as_millis(), 600);
        assert_eq!(cfg.recovery_turn().as_millis(), 800);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_profiles_use_opposite_wiring() {
        let vacuum = ControllerConfig::for_profile(Profile::Vacuum);
        let rover = ControllerConfig::for_profile(Profile::Rover);
        assert_eq!(vacuum.polarity.apply(100, 100), (-100, 100));
        assert_eq!(rover.polarity.apply(100, 100), (100, 100));
        assert_eq!(vacuum.brush_speed, Some(180));
        assert_eq!(rover.brush_speed, None);
        assert_eq!(rover.cruise_speed, 150);
    }

    #[test]
    fn test_polarity_saturates_on_min() {
        let p = Polarity {
            invert_left: true,
            invert_right: true,
        };
        assert_eq!(p.apply(i16::MIN, -5), (i16::MAX, 5));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = ControllerConfig::default();
        cfg.obstacle_threshold_cm = f32::NAN;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidThreshold(_))));

        let mut cfg = ControllerConfig::default();
        cfg.obstacle_threshold_cm = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidThreshold(_))));

        let mut cfg = ControllerConfig::default();
        cfg.cruise_speed = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroCruiseSpeed));

        let mut cfg = ControllerConfig::default();
        cfg.recovery_speed = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroRecoverySpeed));
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let cfg: ControllerConfig = serde_json::from_str(
            r#"{"cruise_speed": 120, "polarity": {"invert_left": true}}"#,
        )
        .unwrap();
        assert_eq!(cfg.cruise_speed, 120);
        assert_eq!(cfg.recovery_speed, DEFAULT_SPEED);
        assert!(cfg.polarity.invert_left);
        assert!(!cfg.polarity.invert_right);
        assert_eq!(cfg.echo_timeout_us, DEFAULT_ECHO_TIMEOUT_US);
    }
}
