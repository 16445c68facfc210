// RAW command word codec
//
// Word layout (20 bits): [control:4 | byte_high:8 | byte_low:8]
// Hex strings carry the same value, most significant character first, "3FFFF".

use serde::{Deserialize, Serialize};

/// Only the low 20 bits of a word are meaningful
pub const WORD_MASK: u32 = 0xF_FFFF;

/// Longest accepted hex string (5 nibbles = 20 bits)
pub const MAX_HEX_LEN: usize = 5;

/// A 20-bit RAW command word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct CommandWord(u32);

impl CommandWord {
    /// Wrap a value, dropping everything above bit 19
    pub fn new(value: u32) -> Self {
        Self(value & WORD_MASK)
    }

    /// Pack the three fields back into a word
    pub fn from_fields(control: u8, byte_high: u8, byte_low: u8) -> Self {
        Self::new(((control as u32 & 0xF) << 16) | ((byte_high as u32) << 8) | byte_low as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Bits 16..=19
    pub fn control(self) -> u8 {
        ((self.0 >> 16) & 0xF) as u8
    }

    /// Bits 8..=15
    pub fn byte_high(self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    /// Bits 0..=7
    pub fn byte_low(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Read a single bit of the word (bit 16 is the lowest control bit)
    pub fn bit(self, index: u8) -> bool {
        index < 20 && (self.0 >> index) & 1 == 1
    }

    pub fn decode(self) -> DecodedWord {
        DecodedWord {
            control: self.control(),
            byte_high: self.byte_high(),
            byte_low: self.byte_low(),
        }
    }
}

impl From<u32> for CommandWord {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<CommandWord> for u32 {
    fn from(word: CommandWord) -> Self {
        word.0
    }
}

/// Typed view of a decoded word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedWord {
    pub control: u8,
    pub byte_high: u8,
    pub byte_low: u8,
}

/// Split any integer into word fields (masked to 20 bits)
pub fn decode(word: u64) -> DecodedWord {
    CommandWord::new((word & WORD_MASK as u64) as u32).decode()
}

/// Parse a hex command string such as "3FFFF"
///
/// Returns `None` for an empty string or one longer than five characters.
/// Only `0-9` and uppercase `A-F` carry value; every other character counts
/// as the digit 0 rather than rejecting the string.
pub fn parse_hex(s: &str) -> Option<CommandWord> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_HEX_LEN {
        return None;
    }

    let mut value: u32 = 0;
    let mut power: u32 = 1;
    for &c in bytes.iter().rev() {
        value += hex_digit(c) * power;
        power *= 16;
    }

    Some(CommandWord::new(value))
}

fn hex_digit(c: u8) -> u32 {
    match c {
        b'0'..=b'9' => (c - b'0') as u32,
        b'A'..=b'F' => (c - b'A' + 10) as u32,
        _ => 0,
    }
}
