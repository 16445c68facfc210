// Message types for the runtime

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::hal::{BoardState, ServoChannel};
use crate::motion::{DriveKeyword, Gesture, ServoTargets};
use crate::protocol::CommandWord;

/// Drive command, one variant per calling convention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveCommand {
    Keyword {
        keyword: DriveKeyword,
        #[serde(default)]
        speeds: Option<(i32, i32)>,
    },
    /// Single keyboard key, mapped through `DriveKeyword::from_key`
    Key {
        key: char,
        #[serde(default)]
        speeds: Option<(i32, i32)>,
    },
    Vector {
        speed_a: i32,
        speed_b: i32,
    },
    Raw {
        word: CommandWord,
    },
    RawHex {
        hex: String,
    },
}

/// Servo command for the two hands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServoCommand {
    Raw {
        word: CommandWord,
    },
    RawHex {
        hex: String,
    },
    Targets(ServoTargets),
    /// Bound-to-bound gesture
    Sweep {
        channel: ServoChannel,
        gesture: Gesture,
    },
    /// Gesture from the current angle to the bound
    Consecutive {
        channel: ServoChannel,
        gesture: Gesture,
    },
    Step {
        channel: ServoChannel,
        gesture: Gesture,
    },
    Key {
        key: char,
    },
}

/// Anything the controller accepts. The caller picks the domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Drive(DriveCommand),
    Servo(ServoCommand),
}

/// Why a command had no effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Hex string empty or longer than five characters
    HexLength { len: usize },
    UnknownKey { key: char },
    /// Servo word with neither hand active
    NoActiveChannel,
}

/// Result of executing a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Ignored(IgnoreReason),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Emitted by the runtime after every command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub command: Command,
    pub outcome: Outcome,
    pub board: BoardState,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseCommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command verb '{0}'")]
    UnknownVerb(String),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Unexpected trailing input '{0}'")]
    Trailing(String),

    #[error("Invalid number '{text}': {source}")]
    Number {
        text: String,
        source: std::num::ParseIntError,
    },

    #[error("Expected a single key character, got '{0}'")]
    Key(String),

    #[error("Unknown drive keyword '{0}'")]
    Keyword(String),

    #[error("Invalid JSON command: {0}")]
    Json(#[from] serde_json::Error),
}

/// Line protocol:
///
/// ```text
/// M 3FFFF          motor RAW hex
/// S 3A0A0          servo RAW hex
/// V -50 50         drive vector (speed_a, speed_b)
/// D turn_left      drive keyword, optional "D forward 120 80"
/// K w              drive key, "K space" is the space bar (stop)
/// P u              servo key
/// T 90 -           servo targets (left, right), "-" leaves a hand alone
/// {"drive": ...}   JSON command
/// ```
impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.starts_with('{') {
            return Ok(serde_json::from_str(line)?);
        }

        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or(ParseCommandError::Empty)?;

        let command = match verb {
            "M" | "m" => Command::Drive(DriveCommand::RawHex {
                hex: arg(&mut parts, "hex word")?.to_string(),
            }),
            "S" | "s" => Command::Servo(ServoCommand::RawHex {
                hex: arg(&mut parts, "hex word")?.to_string(),
            }),
            "V" | "v" => Command::Drive(DriveCommand::Vector {
                speed_a: number(arg(&mut parts, "speed_a")?)?,
                speed_b: number(arg(&mut parts, "speed_b")?)?,
            }),
            "D" | "d" => {
                let keyword = keyword(arg(&mut parts, "keyword")?)?;
                let speeds = match parts.next() {
                    Some(a) => Some((number(a)?, number(arg(&mut parts, "speed_b")?)?)),
                    None => None,
                };
                Command::Drive(DriveCommand::Keyword { keyword, speeds })
            }
            "K" | "k" => Command::Drive(DriveCommand::Key {
                key: key(arg(&mut parts, "key")?)?,
                speeds: None,
            }),
            "P" | "p" => Command::Servo(ServoCommand::Key {
                key: key(arg(&mut parts, "key")?)?,
            }),
            "T" | "t" => Command::Servo(ServoCommand::Targets(ServoTargets {
                left: target(arg(&mut parts, "left target")?)?,
                right: target(arg(&mut parts, "right target")?)?,
            })),
            other => return Err(ParseCommandError::UnknownVerb(other.to_string())),
        };

        match parts.next() {
            Some(extra) => Err(ParseCommandError::Trailing(extra.to_string())),
            None => Ok(command),
        }
    }
}

fn arg<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<&'a str, ParseCommandError> {
    parts.next().ok_or(ParseCommandError::MissingArgument(name))
}

fn number(text: &str) -> Result<i32, ParseCommandError> {
    text.parse().map_err(|source| ParseCommandError::Number {
        text: text.to_string(),
        source,
    })
}

fn target(text: &str) -> Result<Option<i32>, ParseCommandError> {
    if text == "-" {
        Ok(None)
    } else {
        number(text).map(Some)
    }
}

// Whitespace splits arguments, so the space bar is spelled out
fn key(text: &str) -> Result<char, ParseCommandError> {
    if text.eq_ignore_ascii_case("space") {
        return Ok(' ');
    }
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ParseCommandError::Key(text.to_string())),
    }
}

// Keyword names follow the serde (snake_case) names
fn keyword(text: &str) -> Result<DriveKeyword, ParseCommandError> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .map_err(|_| ParseCommandError::Keyword(text.to_string()))
}
