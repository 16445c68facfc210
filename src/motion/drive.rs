// Differential drive dispatch for the BOXZ base
//
// Two wheels, each with one direction line and one PWM duty channel.
// Side A = right wheel, side B = left wheel.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ControllerConfig, MAX_SPEED};
use crate::hal::{ActuatorSink, Line, Wheel};
use crate::protocol::MotorWord;

/// Direction primitives of the 4-line driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    /// Levels of (line A, line B)
    pub fn lines(self) -> (bool, bool) {
        match self {
            Direction::Forward => (true, true),
            Direction::Backward => (false, false),
            Direction::Left => (true, false),
            Direction::Right => (false, true),
        }
    }
}

/// Named drive moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveKeyword {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    DiagonalForwardRight,
    DiagonalForwardLeft,
    DiagonalBackwardRight,
    DiagonalBackwardLeft,
    Stop,
}

impl DriveKeyword {
    /// Keyboard binding of the base (WASD plus QEZX diagonals, space stops)
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'w' => Some(DriveKeyword::Forward),
            's' => Some(DriveKeyword::Backward),
            'a' => Some(DriveKeyword::TurnLeft),
            'd' => Some(DriveKeyword::TurnRight),
            'q' => Some(DriveKeyword::DiagonalForwardLeft),
            'e' => Some(DriveKeyword::DiagonalForwardRight),
            'z' => Some(DriveKeyword::DiagonalBackwardLeft),
            'x' => Some(DriveKeyword::DiagonalBackwardRight),
            ' ' => Some(DriveKeyword::Stop),
            _ => None,
        }
    }
}

/// One write sequence issued to the drivetrain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveAction {
    Move {
        direction: Direction,
        speed_a: i32,
        speed_b: i32,
    },
    Stop,
}

impl DriveAction {
    fn go(direction: Direction, speed_a: i32, speed_b: i32) -> Self {
        DriveAction::Move {
            direction,
            speed_a,
            speed_b,
        }
    }
}

/// Resolve a keyword into a single action
///
/// `speeds` overrides the configured default speed for both wheels. Turns
/// subtract `speed_fix1` from both wheels, diagonals subtract `speed_fix2`
/// from the wheel on the inside of the curve. Supplied speeds are clamped to
/// `[-MAX_SPEED, MAX_SPEED]` before the offsets apply.
pub fn plan_keyword(
    keyword: DriveKeyword,
    speeds: Option<(i32, i32)>,
    config: &ControllerConfig,
) -> DriveAction {
    let (a, b) = match speeds {
        Some((a, b)) => (a.clamp(-MAX_SPEED, MAX_SPEED), b.clamp(-MAX_SPEED, MAX_SPEED)),
        None => (config.default_speed, config.default_speed),
    };
    let fix1 = config.speed_fix1;
    let fix2 = config.speed_fix2;

    match keyword {
        DriveKeyword::Forward => DriveAction::go(Direction::Forward, a, b),
        DriveKeyword::Backward => DriveAction::go(Direction::Backward, a, b),
        DriveKeyword::TurnLeft => DriveAction::go(Direction::Left, a - fix1, b - fix1),
        DriveKeyword::TurnRight => DriveAction::go(Direction::Right, a - fix1, b - fix1),
        DriveKeyword::DiagonalForwardLeft => DriveAction::go(Direction::Forward, a, b - fix2),
        DriveKeyword::DiagonalForwardRight => DriveAction::go(Direction::Forward, a - fix2, b),
        DriveKeyword::DiagonalBackwardLeft => DriveAction::go(Direction::Backward, a, b - fix2),
        DriveKeyword::DiagonalBackwardRight => DriveAction::go(Direction::Backward, a - fix2, b),
        DriveKeyword::Stop => DriveAction::Stop,
    }
}

/// Resolve a signed speed vector into the action sequence it triggers
///
/// The quadrant checks run one after another and flip signs in place, so
/// later checks see the magnitudes left by earlier ones. Several actions may
/// fire for one vector, and any vector whose magnitudes are both at or below
/// `stop_threshold` ends with a stop.
pub fn plan_vector(speed_a: i32, speed_b: i32, stop_threshold: i32) -> Vec<DriveAction> {
    let mut a = speed_a.clamp(-MAX_SPEED, MAX_SPEED);
    let mut b = speed_b.clamp(-MAX_SPEED, MAX_SPEED);
    let mut actions = Vec::with_capacity(2);

    if a >= 0 && b >= 0 {
        actions.push(DriveAction::go(Direction::Forward, a, b));
    }
    if a <= 0 && b <= 0 {
        a = -a;
        b = -b;
        actions.push(DriveAction::go(Direction::Backward, a, b));
    }
    if a <= 0 && b >= 0 {
        a = -a;
        actions.push(DriveAction::go(Direction::Left, a, b));
    }
    if a >= 0 && b <= 0 {
        b = -b;
        actions.push(DriveAction::go(Direction::Right, a, b));
    }
    if a <= stop_threshold && b <= stop_threshold {
        actions.push(DriveAction::Stop);
    }

    actions
}

/// Write one action to the drivetrain
///
/// Stop only clears the duty cycles; direction lines keep their level.
pub fn apply<S: ActuatorSink>(sink: &mut S, action: DriveAction) {
    debug!("Drive action: {:?}", action);
    match action {
        DriveAction::Move {
            direction,
            speed_a,
            speed_b,
        } => {
            let (line_a, line_b) = direction.lines();
            sink.set_direction_line(Line::A, line_a);
            sink.set_direction_line(Line::B, line_b);
            sink.set_duty_cycle(Wheel::A, to_duty(speed_a));
            sink.set_duty_cycle(Wheel::B, to_duty(speed_b));
        }
        DriveAction::Stop => {
            sink.set_duty_cycle(Wheel::A, 0);
            sink.set_duty_cycle(Wheel::B, 0);
        }
    }
}

/// Pass a RAW motor word straight to the driver
pub fn apply_raw<S: ActuatorSink>(sink: &mut S, word: MotorWord) {
    debug!("Raw motor word: {:?}", word);
    sink.set_direction_line(Line::A, word.line_a);
    sink.set_direction_line(Line::B, word.line_b);
    sink.set_duty_cycle(Wheel::A, word.speed_a);
    sink.set_duty_cycle(Wheel::B, word.speed_b);
}

/// Saturate a computed speed into the 8-bit PWM range
fn to_duty(speed: i32) -> u8 {
    speed.clamp(0, MAX_SPEED) as u8
}
