pub mod bits;
pub mod level;
pub mod payload;

pub use bits::{decode_packed_char, encode_packed_char, BitReader, BitWriter};
pub use level::{decode_level, encode_level, round_level, LevelCode};
pub use payload::{decode_values, encode_ieee};
