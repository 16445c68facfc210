// Speeds, servo limits, timing and runtime defaults
use std::fs;
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// Drive
pub const DEFAULT_SPEED: i32 = 255; // full duty
pub const SPEED_FIX1: i32 = 60; // subtracted from both wheels on turns
pub const SPEED_FIX2: i32 = 120; // subtracted from one wheel on diagonals
pub const STOP_THRESHOLD: i32 = 100; // vector commands at or below this stop
pub const MAX_SPEED: i32 = 255;

// Servo range (degrees); the hardware range is 0..=180
pub const SERVO_DEGREES_MAX: i32 = 180;
pub const SERVO_POS_MIN: i32 = 20;
pub const SERVO_POS_MAX: i32 = 160;
pub const SERVO_HOME: i32 = 20; // parking position at power-up
pub const SERVO_FRAME: NonZeroU32 = NonZeroU32::new(20).unwrap(); // interpolation frames per move
pub const MAX_FRAME_COUNT: u32 = 1000; // one trajectory holds frame_count + 1 frames
pub const SERVO_DELAY_MS: u64 = 1; // delay after each frame
pub const SERVO_STEP_DEGREES: i32 = 10; // nudge size

// Servo pulse calibration: pulse_us = 600 + 10 * degrees
pub const PULSE_BASE_US: i32 = 600;
pub const PULSE_PER_DEGREE: i32 = 10;

// Runtime
pub const DEFAULT_BAUDRATE: u32 = 9600;
pub const SERIAL_TIMEOUT: Duration = Duration::from_millis(100);
pub const COMMAND_QUEUE_DEPTH: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid servo range: min {min} > max {max}")]
    ServoRange { min: i32, max: i32 },

    #[error("Servo position {value} outside 0..=180")]
    ServoDegrees { value: i32 },

    #[error("Speed value {value} outside 0..=255")]
    Speed { value: i32 },

    #[error("Frame count {value} above 1000")]
    FrameCount { value: u32 },
}

/// Tunables of the controller, loadable from a JSON file
///
/// Missing fields fall back to the constants above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub default_speed: i32,
    pub speed_fix1: i32,
    pub speed_fix2: i32,
    pub stop_threshold: i32,
    pub servo_pos_min: i32,
    pub servo_pos_max: i32,
    pub servo_home: i32,
    pub frame_count: NonZeroU32,
    pub frame_delay_ms: u64,
    pub step_degrees: i32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_speed: DEFAULT_SPEED,
            speed_fix1: SPEED_FIX1,
            speed_fix2: SPEED_FIX2,
            stop_threshold: STOP_THRESHOLD,
            servo_pos_min: SERVO_POS_MIN,
            servo_pos_max: SERVO_POS_MAX,
            servo_home: SERVO_HOME,
            frame_count: SERVO_FRAME,
            frame_delay_ms: SERVO_DELAY_MS,
            step_degrees: SERVO_STEP_DEGREES,
        }
    }
}

impl ControllerConfig {
    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for value in [self.servo_pos_min, self.servo_pos_max, self.servo_home] {
            if !(0..=SERVO_DEGREES_MAX).contains(&value) {
                return Err(ConfigError::ServoDegrees { value });
            }
        }
        if self.servo_pos_min > self.servo_pos_max {
            return Err(ConfigError::ServoRange {
                min: self.servo_pos_min,
                max: self.servo_pos_max,
            });
        }
        for value in [
            self.default_speed,
            self.speed_fix1,
            self.speed_fix2,
            self.stop_threshold,
        ] {
            if !(0..=MAX_SPEED).contains(&value) {
                return Err(ConfigError::Speed { value });
            }
        }
        if self.frame_count.get() > MAX_FRAME_COUNT {
            return Err(ConfigError::FrameCount {
                value: self.frame_count.get(),
            });
        }
        Ok(())
    }

    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }

    /// Clamp a target angle into the configured servo range
    pub fn clamp_position(&self, degrees: i32) -> i32 {
        degrees.clamp(self.servo_pos_min, self.servo_pos_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.frame_count.get(), 20);
        assert_eq!(config.servo_pos_min, 20);
        assert_eq!(config.servo_pos_max, 160);
        assert_eq!(config.frame_delay(), Duration::from_millis(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ControllerConfig::from_json(r#"{"frame_count": 5, "servo_pos_max": 150}"#)
            .expect("valid config");
        assert_eq!(config.frame_count.get(), 5);
        assert_eq!(config.servo_pos_max, 150);
        assert_eq!(config.servo_pos_min, SERVO_POS_MIN);
        assert_eq!(config.default_speed, DEFAULT_SPEED);
    }

    #[test]
    fn test_zero_frames_rejected() {
        let err = ControllerConfig::from_json(r#"{"frame_count": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_frame_count_upper_bound() {
        let err = ControllerConfig::from_json(r#"{"frame_count": 4294967295}"#).unwrap_err();
        assert!(matches!(err, ConfigError::FrameCount { value: u32::MAX }));
        let err = ControllerConfig::from_json(r#"{"frame_count": 1001}"#).unwrap_err();
        assert!(matches!(err, ConfigError::FrameCount { value: 1001 }));
        let config =
            ControllerConfig::from_json(r#"{"frame_count": 1000}"#).expect("valid config");
        assert_eq!(config.frame_count.get(), MAX_FRAME_COUNT);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let json = r#"{"servo_pos_min": 120, "servo_pos_max": 60}"#;
        let err = ControllerConfig::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::ServoRange { min: 120, max: 60 }));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let err = ControllerConfig::from_json(r#"{"servo_pos_max": 200}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ServoDegrees { value: 200 }));
        let err = ControllerConfig::from_json(r#"{"speed_fix1": 300}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Speed { value: 300 }));
    }

    #[test]
    fn test_clamp_position() {
        let config = ControllerConfig::default();
        assert_eq!(config.clamp_position(0), 20);
        assert_eq!(config.clamp_position(255), 160);
        assert_eq!(config.clamp_position(90), 90);
    }
}
