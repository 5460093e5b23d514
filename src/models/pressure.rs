use serde::{Deserialize, Serialize};

use crate::error::ProcessingError;
use crate::models::{DateStamp, GridId, Level, RecordHeader, VerticalCoordinateType};
use crate::utils::constants::PASCALS_PER_HECTOPASCAL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressureUnit {
    Hectopascal,
    Pascal,
}

impl PressureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            PressureUnit::Hectopascal => "hPa",
            PressureUnit::Pascal => "Pa",
        }
    }
}

/// How surface pressure enters the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PressureMode {
    /// Use the P0 field found next to the levels
    #[default]
    Analytic,
    /// Substitute a constant 1013.25 hPa surface pressure
    StandardAtmosphere,
}

impl PressureMode {
    pub fn from_flag(standard_atmosphere: bool) -> Self {
        if standard_atmosphere {
            PressureMode::StandardAtmosphere
        } else {
            PressureMode::Analytic
        }
    }

    pub fn is_standard_atmosphere(&self) -> bool {
        matches!(self, PressureMode::StandardAtmosphere)
    }
}

/// Pressure on one level of one grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureField {
    pub grid: GridId,
    pub coordinate: VerticalCoordinateType,
    pub level: Level,
    pub ip1: i32,
    pub valid_date: DateStamp,
    pub ni: u32,
    pub nj: u32,
    pub values: Vec<f64>,
    pub unit: PressureUnit,
    pub standard_atmosphere: bool,
    /// Data record the level was taken from
    pub source: RecordHeader,
}

impl PressureField {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    pub fn to_pascals(&self) -> PressureField {
        let factor = match self.unit {
            PressureUnit::Hectopascal => PASCALS_PER_HECTOPASCAL,
            PressureUnit::Pascal => 1.0,
        };

        PressureField {
            values: self.values.iter().map(|v| v * factor).collect(),
            unit: PressureUnit::Pascal,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    MissingCoefficients { missing: String },
    ShapeMismatch { expected: usize, found: usize },
    Unsupported { message: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingCoefficients { missing } => {
                write!(f, "missing coefficients: {}", missing)
            }
            SkipReason::ShapeMismatch { expected, found } => {
                write!(f, "expected {} points, found {}", expected, found)
            }
            SkipReason::Unsupported { message } => write!(f, "{}", message),
        }
    }
}

/// A group the engine could not compute, returned next to the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipWarning {
    pub grid: GridId,
    pub coordinate: VerticalCoordinateType,
    pub valid_date: DateStamp,
    pub reason: SkipReason,
}

impl SkipWarning {
    pub fn group_label(&self) -> String {
        format!(
            "grid {} {} at {}",
            self.grid, self.coordinate, self.valid_date
        )
    }

    pub fn to_error(&self) -> ProcessingError {
        ProcessingError::MissingCoefficients {
            group: self.group_label(),
            missing: self.reason.to_string(),
        }
    }
}

impl std::fmt::Display for SkipWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "skipped {}: {}", self.group_label(), self.reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PressureReport {
    pub fields: Vec<PressureField>,
    pub warnings: Vec<SkipWarning>,
}

impl PressureReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: PressureReport) {
        self.fields.extend(other.fields);
        self.warnings.extend(other.warnings);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} pressure fields computed, {} groups skipped",
            self.fields.len(),
            self.warnings.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LevelKind;

    fn field(values: Vec<f64>) -> PressureField {
        PressureField {
            grid: GridId(1, 2),
            coordinate: VerticalCoordinateType::Sigma,
            level: Level::new(0.5, LevelKind::Sigma),
            ip1: 7000,
            valid_date: DateStamp(0),
            ni: values.len() as u32,
            nj: 1,
            values,
            unit: PressureUnit::Hectopascal,
            standard_atmosphere: false,
            source: RecordHeader::builder("TT").build().unwrap(),
        }
    }

    #[test]
    fn test_conversion_to_pascals() {
        let hpa = field(vec![500.0, 1000.0]);
        let pa = hpa.to_pascals();
        assert_eq!(pa.values, vec![50_000.0, 100_000.0]);
        assert_eq!(pa.unit, PressureUnit::Pascal);
        assert_eq!(pa.to_pascals().values, pa.values);
    }

    #[test]
    fn test_extremes() {
        let f = field(vec![3.0, 1.0, 2.0]);
        assert_eq!(f.min(), Some(1.0));
        assert_eq!(f.max(), Some(3.0));
    }

    #[test]
    fn test_skip_warning_maps_to_non_fatal_error() {
        let warning = SkipWarning {
            grid: GridId(10, 20),
            coordinate: VerticalCoordinateType::Hybrid,
            valid_date: DateStamp(0),
            reason: SkipReason::MissingCoefficients {
                missing: "P0".to_string(),
            },
        };
        let err = warning.to_error();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("grid 10/20 HYBRID"));
    }
}
