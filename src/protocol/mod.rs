// Command protocol for the BOXZ base and arms
//
// Provides:
// - RAW word codec (20-bit words and their hex string form)
// - Motor and servo word decoders

pub mod decoder;
pub mod word;

pub use decoder::{MotorWord, ServoWord, decode_motor, decode_servo};
pub use word::{CommandWord, DecodedWord, decode, parse_hex};
