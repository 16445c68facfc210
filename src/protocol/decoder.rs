// Domain decoders for RAW words
//
// The same 20-bit layout means different things on the two command surfaces;
// the caller picks the surface.

use serde::{Deserialize, Serialize};

use super::word::CommandWord;

/// Control bit driving direction line B
pub const MOTOR_LINE_B_BIT: u8 = 16;
/// Control bit driving direction line A
pub const MOTOR_LINE_A_BIT: u8 = 17;

/// Control bit enabling the left hand (servo 01)
pub const SERVO_LEFT_ACTIVE_BIT: u8 = 16;
/// Control bit enabling the right hand (servo 02)
pub const SERVO_RIGHT_ACTIVE_BIT: u8 = 17;

/// Motor word: direction lines pass straight through, bytes are duty cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorWord {
    pub line_a: bool,
    pub line_b: bool,
    /// Right wheel duty (byte_low)
    pub speed_a: u8,
    /// Left wheel duty (byte_high)
    pub speed_b: u8,
}

impl MotorWord {
    pub fn to_word(self) -> CommandWord {
        let control = ((self.line_a as u8) << (MOTOR_LINE_A_BIT - 16))
            | ((self.line_b as u8) << (MOTOR_LINE_B_BIT - 16));
        CommandWord::from_fields(control, self.speed_b, self.speed_a)
    }
}

impl From<CommandWord> for MotorWord {
    fn from(word: CommandWord) -> Self {
        Self {
            line_a: word.bit(MOTOR_LINE_A_BIT),
            line_b: word.bit(MOTOR_LINE_B_BIT),
            speed_a: word.byte_low(),
            speed_b: word.byte_high(),
        }
    }
}

/// Servo word: targets in degrees, `None` for an inactive channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoWord {
    pub left: Option<u8>,
    pub right: Option<u8>,
}

/// Decode a word received on the motor surface
pub fn decode_motor(word: CommandWord) -> MotorWord {
    MotorWord::from(word)
}

/// Decode a word received on the servo surface
///
/// Returns `None` when neither channel is active.
pub fn decode_servo(word: CommandWord) -> Option<ServoWord> {
    let left = word.bit(SERVO_LEFT_ACTIVE_BIT).then(|| word.byte_low());
    let right = word.bit(SERVO_RIGHT_ACTIVE_BIT).then(|| word.byte_high());

    if left.is_none() && right.is_none() {
        return None;
    }
    Some(ServoWord { left, right })
}
