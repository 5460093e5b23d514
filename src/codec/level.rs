//! Packing of `(value, kind)` level descriptors into the 32-bit `ip` fields.
//!
//! Two encodings coexist in the wild:
//!
//! * legacy: small integers (0..=32767) whose range implies the kind, with a
//!   fixed scale per kind;
//! * extended: `kind << 24 | exponent << 20 | mantissa`, where the value is
//!   `mantissa * 10^(4 - exponent)` and negative mantissas are stored as
//!   `1_000_000 + |mantissa|`.
//!
//! Every extended code is larger than the largest legacy code, which is how
//! [`decode_level`] tells them apart.

use crate::error::{ProcessingError, Result};
use crate::models::{Level, LevelKind, LevelStyle};
use crate::utils::constants::{LEGACY_IP_MAX, LEVEL_DECIMALS};

const MANTISSA_BITS: u32 = 20;
const MANTISSA_MASK: i32 = (1 << MANTISSA_BITS) - 1;
const EXPONENT_MASK: i32 = 0xF;
const KIND_MASK: i32 = 0x7F;
const EXPONENT_BIAS: i32 = 4;
const MAX_EXPONENT: i32 = 15;
const POSITIVE_LIMIT: i64 = 1_000_000;
const NEGATIVE_LIMIT: i64 = MANTISSA_MASK as i64 - POSITIVE_LIMIT;

// Legacy ranges
const LEGACY_PRESSURE_MAX: i32 = 1100;
const LEGACY_ARBITRARY_BASE: i32 = 1200;
const LEGACY_ARBITRARY_MAX: i32 = 1999;
const LEGACY_SIGMA_BASE: i32 = 2000;
const LEGACY_SIGMA_MAX: i32 = 12000;
const LEGACY_SIGMA_SCALE: f64 = 10_000.0;
const LEGACY_HEIGHT_BASE: i32 = 12001;
const LEGACY_HEIGHT_MAX: i32 = 32000;
const LEGACY_HEIGHT_STEP: f64 = 5.0;

/// A packed level identifier, tagged with the era that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelCode {
    Legacy(i32),
    Extended {
        kind: LevelKind,
        exponent: u8,
        mantissa: i32,
    },
    /// Negative identifiers mark an absent level
    Undefined(i32),
}

impl LevelCode {
    /// Inspect the bit pattern of `ip` and split it into its components.
    pub fn detect(ip: i32) -> Result<Self> {
        if ip < 0 {
            return Ok(LevelCode::Undefined(ip));
        }
        if ip <= LEGACY_IP_MAX {
            return Ok(LevelCode::Legacy(ip));
        }

        let kind = LevelKind::from_code((ip >> 24) & KIND_MASK)?;
        let exponent = ((ip >> MANTISSA_BITS) & EXPONENT_MASK) as u8;
        let raw = ip & MANTISSA_MASK;
        let mantissa = if i64::from(raw) > POSITIVE_LIMIT {
            -(raw - POSITIVE_LIMIT as i32)
        } else {
            raw
        };

        Ok(LevelCode::Extended {
            kind,
            exponent,
            mantissa,
        })
    }

    pub fn style(&self) -> Option<LevelStyle> {
        match self {
            LevelCode::Legacy(_) => Some(LevelStyle::Legacy),
            LevelCode::Extended { .. } => Some(LevelStyle::Extended),
            LevelCode::Undefined(_) => None,
        }
    }

    /// Unpacked level, rounded to the format's six decimals.
    pub fn level(&self) -> Result<Level> {
        let level = match *self {
            LevelCode::Undefined(ip) => Level::new(f64::from(ip), LevelKind::Undefined),
            LevelCode::Legacy(ip) => decode_legacy(ip)?,
            LevelCode::Extended {
                kind,
                exponent,
                mantissa,
            } => {
                let shift = EXPONENT_BIAS - i32::from(exponent);
                let value = if shift >= 0 {
                    f64::from(mantissa) * 10f64.powi(shift)
                } else {
                    f64::from(mantissa) / 10f64.powi(-shift)
                };
                Level::new(value, kind)
            }
        };

        Ok(Level::new(round_level(level.value), level.kind))
    }

    /// Repack into the integer stored in a record header.
    pub fn ip(&self) -> i32 {
        match *self {
            LevelCode::Legacy(ip) | LevelCode::Undefined(ip) => ip,
            LevelCode::Extended {
                kind,
                exponent,
                mantissa,
            } => {
                let raw = if mantissa < 0 {
                    POSITIVE_LIMIT as i32 - mantissa
                } else {
                    mantissa
                };
                (kind.code() << 24) | (i32::from(exponent) << MANTISSA_BITS) | raw
            }
        }
    }
}

/// Decode an `ip` field, detecting the packing era automatically.
pub fn decode_level(ip: i32) -> Result<Level> {
    LevelCode::detect(ip)?.level()
}

/// Encode `value` of the given kind with the requested packing era.
pub fn encode_level(value: f64, kind: LevelKind, style: LevelStyle) -> Result<i32> {
    if !value.is_finite() {
        return Err(ProcessingError::InvalidFormat(format!(
            "Level value {} is not finite",
            value
        )));
    }
    if kind == LevelKind::Undefined {
        return Err(ProcessingError::UnsupportedKind(kind.code()));
    }

    let code = match style {
        LevelStyle::Legacy => LevelCode::Legacy(encode_legacy(value, kind)?),
        LevelStyle::Extended => encode_extended(value, kind)?,
    };

    Ok(code.ip())
}

/// Round to the six decimals the format can carry.
pub fn round_level(value: f64) -> f64 {
    let scale = 10f64.powi(LEVEL_DECIMALS);
    (value * scale).round() / scale
}

fn encode_extended(value: f64, kind: LevelKind) -> Result<LevelCode> {
    let limit = if value < 0.0 {
        NEGATIVE_LIMIT as f64
    } else {
        POSITIVE_LIMIT as f64
    };

    let mut exponent = EXPONENT_BIAS;
    let mut scaled = value.abs();

    if scaled != 0.0 {
        while scaled.round() > limit {
            if exponent == 0 {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Level value {} is too large for kind {}",
                    value, kind
                )));
            }
            scaled /= 10.0;
            exponent -= 1;
        }

        // Normalise into the last decade below the limit
        while exponent < MAX_EXPONENT && scaled * 10.0 < limit {
            scaled *= 10.0;
            exponent += 1;
        }
    }

    let magnitude = scaled.round() as i32;
    let mantissa = if value < 0.0 { -magnitude } else { magnitude };

    Ok(LevelCode::Extended {
        kind,
        exponent: exponent as u8,
        mantissa,
    })
}

fn is_integral(value: f64) -> bool {
    (value - value.round()).abs() <= 1e-7 * value.abs().max(1.0)
}

fn encode_legacy(value: f64, kind: LevelKind) -> Result<i32> {
    let out_of_range = || {
        ProcessingError::InvalidFormat(format!(
            "Level value {} of kind {} has no legacy encoding",
            value, kind
        ))
    };

    match kind {
        LevelKind::Pressure => {
            if !(0.0..=f64::from(LEGACY_PRESSURE_MAX)).contains(&value) || !is_integral(value) {
                return Err(out_of_range());
            }
            Ok(value.round() as i32)
        }
        LevelKind::Arbitrary => {
            let max = f64::from(LEGACY_ARBITRARY_MAX - LEGACY_ARBITRARY_BASE);
            if !(0.0..=max).contains(&value) || !is_integral(value) {
                return Err(out_of_range());
            }
            Ok(LEGACY_ARBITRARY_BASE + value.round() as i32)
        }
        LevelKind::Sigma => {
            if !(0.0..=1.0).contains(&value) {
                return Err(out_of_range());
            }
            Ok(LEGACY_SIGMA_BASE + (value * LEGACY_SIGMA_SCALE).round() as i32)
        }
        LevelKind::HeightSea => {
            let max = f64::from(LEGACY_HEIGHT_MAX - LEGACY_HEIGHT_BASE) * LEGACY_HEIGHT_STEP;
            if !(0.0..=max).contains(&value) {
                return Err(out_of_range());
            }
            Ok(LEGACY_HEIGHT_BASE + (value / LEGACY_HEIGHT_STEP).round() as i32)
        }
        other => Err(ProcessingError::UnsupportedKind(other.code())),
    }
}

fn decode_legacy(ip: i32) -> Result<Level> {
    match ip {
        0..=LEGACY_PRESSURE_MAX => Ok(Level::new(f64::from(ip), LevelKind::Pressure)),
        LEGACY_ARBITRARY_BASE..=LEGACY_ARBITRARY_MAX => Ok(Level::new(
            f64::from(ip - LEGACY_ARBITRARY_BASE),
            LevelKind::Arbitrary,
        )),
        LEGACY_SIGMA_BASE..=LEGACY_SIGMA_MAX => Ok(Level::new(
            f64::from(ip - LEGACY_SIGMA_BASE) / LEGACY_SIGMA_SCALE,
            LevelKind::Sigma,
        )),
        LEGACY_HEIGHT_BASE..=LEGACY_HEIGHT_MAX => Ok(Level::new(
            f64::from(ip - LEGACY_HEIGHT_BASE) * LEGACY_HEIGHT_STEP,
            LevelKind::HeightSea,
        )),
        _ => Err(ProcessingError::InvalidFormat(format!(
            "Legacy level code {} falls in a reserved range",
            ip
        ))),
    }
}
