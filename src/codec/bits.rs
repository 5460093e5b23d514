//! Fixed-width big-endian bit fields and the 6-bit packed character alphabet.
//!
//! Directory entries pack most of their fields into widths that do not align
//! to byte boundaries (24-bit `ni`, 20-bit `nk`, 26-bit `npas`, 6-bit
//! characters). Offsets are counted in bits from the start of the slice,
//! most significant bit first.

use crate::error::{ProcessingError, Result};

/// Offset added to a 6-bit code to obtain its ASCII character.
const PACKED_CHAR_BASE: u8 = 32;
const PACKED_CHAR_MAX: u8 = 32 + 63;

/// Reads bit fields from a borrowed byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct BitReader<'a> {
    data: &'a [u8],
    base_offset: u64,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            base_offset: 0,
        }
    }

    /// Reader whose error offsets are reported relative to the containing file.
    pub fn with_base_offset(data: &'a [u8], base_offset: u64) -> Self {
        Self { data, base_offset }
    }

    pub fn len_bits(&self) -> usize {
        self.data.len() * 8
    }

    /// Read `width` bits (1..=32) starting at `bit_offset`.
    pub fn read(&self, bit_offset: usize, width: u32) -> Result<u32> {
        if width == 0 || width > 32 {
            return Err(ProcessingError::InvalidFormat(format!(
                "Bit field width must be between 1 and 32, got {}",
                width
            )));
        }

        let end_bit = bit_offset + width as usize;
        let first = bit_offset / 8;
        let needed = end_bit.div_ceil(8);

        if needed > self.data.len() {
            return Err(ProcessingError::TruncatedRecord {
                offset: self.base_offset + first as u64,
                needed: needed - first,
                available: self.data.len().saturating_sub(first),
            });
        }

        // At most five bytes are touched by a 32-bit field
        let acc = self.data[first..needed]
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
        let shift = (needed - first) * 8 - (bit_offset % 8) - width as usize;
        let mask = (1u64 << width) - 1;

        Ok(((acc >> shift) & mask) as u32)
    }

    /// Read the 32-bit word at `index` (4-byte units).
    pub fn read_word(&self, index: usize) -> Result<u32> {
        self.read(index * 32, 32)
    }

    /// Read `count` packed characters, trailing blanks removed.
    pub fn read_chars(&self, bit_offset: usize, count: usize) -> Result<String> {
        let mut text = String::with_capacity(count);
        for i in 0..count {
            let code = self.read(bit_offset + i * 6, 6)? as u8;
            text.push(decode_packed_char(code));
        }
        Ok(text.trim_end().to_string())
    }

    /// Copy `len` raw bytes starting at byte `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset + len;
        self.data
            .get(offset..end)
            .ok_or(ProcessingError::TruncatedRecord {
                offset: self.base_offset + offset as u64,
                needed: len,
                available: self.data.len().saturating_sub(offset),
            })
    }
}

/// Writes bit fields into an owned, fixed-size buffer.
#[derive(Debug, Clone)]
pub struct BitWriter {
    data: Vec<u8>,
}

impl BitWriter {
    pub fn new(len_bytes: usize) -> Self {
        Self {
            data: vec![0; len_bytes],
        }
    }

    pub fn write(&mut self, bit_offset: usize, width: u32, value: u32) -> Result<()> {
        if width == 0 || width > 32 {
            return Err(ProcessingError::InvalidFormat(format!(
                "Bit field width must be between 1 and 32, got {}",
                width
            )));
        }
        if width < 32 && value >> width != 0 {
            return Err(ProcessingError::InvalidFormat(format!(
                "Value {} does not fit in {} bits",
                value, width
            )));
        }

        let end_bit = bit_offset + width as usize;
        if end_bit.div_ceil(8) > self.data.len() {
            return Err(ProcessingError::TruncatedRecord {
                offset: (bit_offset / 8) as u64,
                needed: end_bit.div_ceil(8) - bit_offset / 8,
                available: self.data.len().saturating_sub(bit_offset / 8),
            });
        }

        for i in 0..width as usize {
            let bit = (value >> (width as usize - 1 - i)) & 1;
            let pos = bit_offset + i;
            let mask = 0x80u8 >> (pos % 8);
            if bit == 1 {
                self.data[pos / 8] |= mask;
            } else {
                self.data[pos / 8] &= !mask;
            }
        }

        Ok(())
    }

    pub fn write_word(&mut self, index: usize, value: u32) -> Result<()> {
        self.write(index * 32, 32, value)
    }

    /// Write `text` as `count` packed characters, blank padded.
    pub fn write_chars(&mut self, bit_offset: usize, count: usize, text: &str) -> Result<()> {
        if text.chars().count() > count {
            return Err(ProcessingError::InvalidFormat(format!(
                "'{}' is longer than {} characters",
                text, count
            )));
        }

        let mut chars = text.chars();
        for i in 0..count {
            let c = chars.next().unwrap_or(' ');
            self.write(bit_offset + i * 6, 6, u32::from(encode_packed_char(c)?))?;
        }

        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

pub fn decode_packed_char(code: u8) -> char {
    char::from((code & 0x3F) + PACKED_CHAR_BASE)
}

/// Lowercase letters are folded to uppercase; anything outside the
/// space..underscore range has no 6-bit code.
pub fn encode_packed_char(c: char) -> Result<u8> {
    let upper = c.to_ascii_uppercase();
    if !upper.is_ascii() {
        return Err(ProcessingError::InvalidFormat(format!(
            "Character '{}' cannot be packed",
            c
        )));
    }

    let byte = upper as u8;
    if !(PACKED_CHAR_BASE..=PACKED_CHAR_MAX).contains(&byte) {
        return Err(ProcessingError::InvalidFormat(format!(
            "Character '{}' cannot be packed",
            c
        )));
    }

    Ok(byte - PACKED_CHAR_BASE)
}
