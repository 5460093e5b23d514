//! Fixed-width numeric payloads (IEEE reals, signed and unsigned integers).

use crate::error::{ProcessingError, Result};
use crate::models::DataType;

/// Decode `count` big-endian values of the given data type.
pub fn decode_values(bytes: &[u8], datyp: u8, nbits: u8, count: usize) -> Result<Vec<f64>> {
    let kind = DataType::from_code(datyp);
    let unsupported = || ProcessingError::UnsupportedDatyp { datyp, nbits };

    if !kind.is_uncompressed_numeric() {
        return Err(unsupported());
    }

    let width = match (kind.base, nbits) {
        (5, 32) | (5, 64) => nbits as usize / 8,
        (2, 8 | 16 | 32) | (4, 8 | 16 | 32) => nbits as usize / 8,
        _ => return Err(unsupported()),
    };

    let needed = count * width;
    if bytes.len() < needed {
        return Err(ProcessingError::TruncatedRecord {
            offset: 0,
            needed,
            available: bytes.len(),
        });
    }

    let values = bytes[..needed]
        .chunks_exact(width)
        .map(|chunk| match (kind.base, width) {
            (5, 4) => f64::from(f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])),
            (5, _) => f64::from_be_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ]),
            (2, 1) => f64::from(chunk[0]),
            (2, 2) => f64::from(u16::from_be_bytes([chunk[0], chunk[1]])),
            (2, _) => f64::from(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])),
            (_, 1) => f64::from(chunk[0] as i8),
            (_, 2) => f64::from(i16::from_be_bytes([chunk[0], chunk[1]])),
            _ => f64::from(i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])),
        })
        .collect();

    Ok(values)
}

/// Encode values as 32- or 64-bit IEEE reals, padded to whole 64-bit words.
pub fn encode_ieee(values: &[f64], nbits: u8) -> Result<Vec<u8>> {
    let mut bytes = match nbits {
        32 => values
            .iter()
            .flat_map(|v| (*v as f32).to_be_bytes())
            .collect::<Vec<u8>>(),
        64 => values.iter().flat_map(|v| v.to_be_bytes()).collect(),
        _ => return Err(ProcessingError::UnsupportedDatyp { datyp: 5, nbits }),
    };

    let padded = bytes.len().div_ceil(8) * 8;
    bytes.resize(padded, 0);
    Ok(bytes)
}
