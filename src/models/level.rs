use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, Result};

/// Physical meaning of a decoded level value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LevelKind {
    Undefined,      // -1
    HeightSea,      // 0, metres above sea level
    Sigma,          // 1
    Pressure,       // 2, millibars
    Arbitrary,      // 3
    HeightGround,   // 4, metres above ground
    Hybrid,         // 5
    Theta,          // 6
    Hours,          // 10
    Reserved,       // 15
    MatrixIndex,    // 17, index into a conversion matrix
    PressureMetres, // 21
}

impl LevelKind {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            -1 => Ok(LevelKind::Undefined),
            0 => Ok(LevelKind::HeightSea),
            1 => Ok(LevelKind::Sigma),
            2 => Ok(LevelKind::Pressure),
            3 => Ok(LevelKind::Arbitrary),
            4 => Ok(LevelKind::HeightGround),
            5 => Ok(LevelKind::Hybrid),
            6 => Ok(LevelKind::Theta),
            10 => Ok(LevelKind::Hours),
            15 => Ok(LevelKind::Reserved),
            17 => Ok(LevelKind::MatrixIndex),
            21 => Ok(LevelKind::PressureMetres),
            _ => Err(ProcessingError::UnsupportedKind(code)),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            LevelKind::Undefined => -1,
            LevelKind::HeightSea => 0,
            LevelKind::Sigma => 1,
            LevelKind::Pressure => 2,
            LevelKind::Arbitrary => 3,
            LevelKind::HeightGround => 4,
            LevelKind::Hybrid => 5,
            LevelKind::Theta => 6,
            LevelKind::Hours => 10,
            LevelKind::Reserved => 15,
            LevelKind::MatrixIndex => 17,
            LevelKind::PressureMetres => 21,
        }
    }

    /// Unit label; kinds without a physical unit map to an empty string.
    pub fn units(&self) -> &'static str {
        match self {
            LevelKind::HeightSea => "m",
            LevelKind::Sigma => "sg",
            LevelKind::Pressure => "mb",
            LevelKind::HeightGround => "M",
            LevelKind::Hybrid => "hy",
            LevelKind::Theta => "th",
            LevelKind::Hours => "H",
            LevelKind::PressureMetres => "mp",
            LevelKind::Undefined
            | LevelKind::Arbitrary
            | LevelKind::Reserved
            | LevelKind::MatrixIndex => "",
        }
    }

    pub fn is_physical(&self) -> bool {
        !matches!(
            self,
            LevelKind::Undefined
                | LevelKind::Arbitrary
                | LevelKind::Reserved
                | LevelKind::MatrixIndex
        )
    }

    /// Kinds numbered 16 and above only exist in the extended encoding.
    pub fn is_extended(&self) -> bool {
        self.code() >= 16
    }

    /// Kinds never considered by vertical coordinate classification.
    pub fn is_classifiable(&self) -> bool {
        !matches!(
            self,
            LevelKind::Undefined | LevelKind::Arbitrary | LevelKind::Theta
        )
    }
}

impl std::fmt::Display for LevelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Packing era requested when encoding a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LevelStyle {
    /// Fixed-scale integers below 32768, kinds 0-3 only
    Legacy,
    /// Mantissa/exponent packing for every kind
    #[default]
    Extended,
}

/// A decoded `(value, kind)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub value: f64,
    pub kind: LevelKind,
}

impl Level {
    pub fn new(value: f64, kind: LevelKind) -> Self {
        Self { value, kind }
    }

    pub fn units(&self) -> &'static str {
        self.kind.units()
    }

    pub fn is_physical(&self) -> bool {
        self.kind.is_physical()
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.units().is_empty() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.value, self.units())
        }
    }
}
