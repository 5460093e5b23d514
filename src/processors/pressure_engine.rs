//! Pressure reconstruction for every classified group of levels.
//!
//! All closed forms work in hectopascals. Surface pressure comes either from
//! the group's `P0` field or, in standard-atmosphere mode, from the constant
//! 1013.25 hPa. Coefficients are resolved once per group; levels are then
//! evaluated independently on the rayon pool.

use crate::codec::decode_level;
use crate::error::Result;
use crate::models::{
    Level, LevelKind, PressureField, PressureMode, PressureReport, PressureUnit, RecordHeader,
    SkipReason, SkipWarning, VerticalCoordinateType,
};
use crate::processors::{classify, GridCoefficients, GroupedRecords, LevelGroup, RecordGrouper};
use crate::readers::FieldSource;
use crate::utils::constants::{PASCALS_PER_HECTOPASCAL, STANDARD_SURFACE_PRESSURE_HPA};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Inner result: `Err` means the group is skipped, not that the pass failed.
type Resolved<T> = std::result::Result<T, SkipReason>;

const TOCTOC_COLUMNS: usize = 3;
const FIRST_STAGGERED_ROW: usize = 3;

#[derive(Debug, Clone, PartialEq)]
enum Surface {
    Standard,
    Field(Vec<f64>),
}

impl Surface {
    fn at(&self, index: usize) -> f64 {
        match self {
            Surface::Standard => STANDARD_SURFACE_PRESSURE_HPA,
            Surface::Field(values) => values[index],
        }
    }
}

/// Coefficients of one group, resolved before any level is evaluated.
#[derive(Debug, Clone, PartialEq)]
enum VerticalGrid {
    Pressure,
    Sigma {
        surface: Surface,
    },
    Eta {
        surface: Surface,
        ptop: f64,
    },
    Hybrid {
        surface: Surface,
        ptop: f64,
        pref: f64,
        rcoef: f64,
    },
    HybridStaggered {
        surface: Surface,
        /// Reference pressure in pascals
        pref_pa: f64,
        /// `(a, b)` per momentum or thermodynamic `ip1`
        coefficients: HashMap<i32, (f64, f64)>,
    },
}

impl VerticalGrid {
    fn evaluate(&self, level: &Level, ip1: i32, points: usize) -> Resolved<Vec<f64>> {
        let values = match self {
            VerticalGrid::Pressure => vec![level.value; points],
            VerticalGrid::Sigma { surface } => (0..points)
                .map(|i| level.value * surface.at(i))
                .collect(),
            VerticalGrid::Eta { surface, ptop } => (0..points)
                .map(|i| ptop * (1.0 - level.value) + level.value * surface.at(i))
                .collect(),
            VerticalGrid::Hybrid {
                surface,
                ptop,
                pref,
                rcoef,
            } => {
                let eta_top = ptop / pref;
                let (hyb, term) = match level.kind {
                    LevelKind::Sigma => (
                        eta_top + level.value * (1.0 - eta_top),
                        level.value.max(0.0),
                    ),
                    _ => (
                        level.value,
                        ((level.value - eta_top) / (1.0 - eta_top)).max(0.0),
                    ),
                };
                let factor = term.powf(*rcoef);
                (0..points)
                    .map(|i| pref * hyb + (surface.at(i) - pref) * factor)
                    .collect()
            }
            VerticalGrid::HybridStaggered {
                surface,
                pref_pa,
                coefficients,
            } => {
                let (a, b) = coefficients.get(&ip1).copied().ok_or_else(|| {
                    SkipReason::MissingCoefficients {
                        missing: format!("A/B pair for ip1 {}", ip1),
                    }
                })?;
                (0..points)
                    .map(|i| {
                        let s = (surface.at(i) * PASCALS_PER_HECTOPASCAL / pref_pa).ln();
                        (a + b * s).exp() / PASCALS_PER_HECTOPASCAL
                    })
                    .collect()
            }
        };
        Ok(values)
    }
}

pub struct PressureEngine {
    mode: PressureMode,
}

impl Default for PressureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PressureEngine {
    pub fn new() -> Self {
        Self {
            mode: PressureMode::Analytic,
        }
    }

    pub fn with_mode(mode: PressureMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> PressureMode {
        self.mode
    }

    /// Classify, group and compute every group found in `records`.
    pub fn compute<S>(&self, records: &[RecordHeader], source: &S) -> Result<PressureReport>
    where
        S: FieldSource + Sync + ?Sized,
    {
        let classification = classify(records)?;
        let grouped = RecordGrouper::new().group(records, &classification)?;
        self.compute_grouped(&grouped, source)
    }

    pub fn compute_grouped<S>(&self, grouped: &GroupedRecords, source: &S) -> Result<PressureReport>
    where
        S: FieldSource + Sync + ?Sized,
    {
        let reports = grouped
            .groups
            .par_iter()
            .map(|group| self.compute_group(group, grouped, source))
            .collect::<Result<Vec<_>>>()?;

        let mut report = PressureReport::new();
        for warning in &grouped.skipped {
            warn!("{}", warning);
        }
        report.warnings.extend(grouped.skipped.iter().cloned());
        for group_report in reports {
            report.merge(group_report);
        }

        info!("{}", report.summary());
        Ok(report)
    }

    fn compute_group<S>(
        &self,
        group: &LevelGroup,
        grouped: &GroupedRecords,
        source: &S,
    ) -> Result<PressureReport>
    where
        S: FieldSource + Sync + ?Sized,
    {
        let mut report = PressureReport::new();
        let first = match group.levels.first() {
            Some((_, record)) => record,
            None => return Ok(report),
        };
        let points = first.ni as usize * first.nj as usize;

        let skip = |reason: SkipReason| {
            let warning = SkipWarning {
                grid: group.key.grid,
                coordinate: group.key.coordinate,
                valid_date: group.key.valid_date,
                reason,
            };
            warn!("{}", warning);
            warning
        };

        let empty = GridCoefficients::default();
        let coefficients = grouped.coefficients_for(group.key.grid).unwrap_or(&empty);

        let grid = match self.resolve(group, coefficients, grouped.hy.as_ref(), points, source)? {
            Ok(grid) => grid,
            Err(reason) => {
                report.warnings.push(skip(reason));
                return Ok(report);
            }
        };

        debug!(
            "Grid {} {}: {} levels at {}",
            group.key.grid,
            group.key.coordinate,
            group.levels.len(),
            group.key.valid_date
        );

        let outcomes: Vec<Resolved<PressureField>> = group
            .levels
            .par_iter()
            .map(|(level, record)| {
                let found = record.ni as usize * record.nj as usize;
                if found != points {
                    return Err(SkipReason::ShapeMismatch {
                        expected: points,
                        found,
                    });
                }
                let values = grid.evaluate(level, record.ip1, points)?;
                Ok(PressureField {
                    grid: group.key.grid,
                    coordinate: group.key.coordinate,
                    level: *level,
                    ip1: record.ip1,
                    valid_date: group.key.valid_date,
                    ni: record.ni,
                    nj: record.nj,
                    values,
                    unit: PressureUnit::Hectopascal,
                    standard_atmosphere: self.mode.is_standard_atmosphere(),
                    source: record.clone(),
                })
            })
            .collect();

        for outcome in outcomes {
            match outcome {
                Ok(field) => report.fields.push(field),
                Err(reason) => report.warnings.push(skip(reason)),
            }
        }

        Ok(report)
    }

    fn resolve<S>(
        &self,
        group: &LevelGroup,
        coefficients: &GridCoefficients,
        hy: Option<&RecordHeader>,
        points: usize,
        source: &S,
    ) -> Result<Resolved<VerticalGrid>>
    where
        S: FieldSource + Sync + ?Sized,
    {
        let coordinate = group.key.coordinate;
        if coordinate == VerticalCoordinateType::Pressure {
            return Ok(Ok(VerticalGrid::Pressure));
        }

        let surface = match self.surface(group, coefficients, points, source)? {
            Ok(surface) => surface,
            Err(reason) => return Ok(Err(reason)),
        };

        let grid = match coordinate {
            VerticalCoordinateType::Sigma => Ok(VerticalGrid::Sigma { surface }),
            VerticalCoordinateType::Eta => {
                eta_top(group, coefficients, source)?.map(|ptop| VerticalGrid::Eta { surface, ptop })
            }
            VerticalCoordinateType::Hybrid => hybrid_parameters(coefficients, hy, source)?.map(
                |(ptop, pref, rcoef)| VerticalGrid::Hybrid {
                    surface,
                    ptop,
                    pref,
                    rcoef,
                },
            ),
            VerticalCoordinateType::HybridStaggered => staggered_table(coefficients, source)?.map(
                |(pref_pa, coefficients)| VerticalGrid::HybridStaggered {
                    surface,
                    pref_pa,
                    coefficients,
                },
            ),
            VerticalCoordinateType::Pressure | VerticalCoordinateType::Unknown => {
                Err(SkipReason::Unsupported {
                    message: format!("no pressure formula for {} levels", coordinate),
                })
            }
        };

        Ok(grid)
    }

    fn surface<S>(
        &self,
        group: &LevelGroup,
        coefficients: &GridCoefficients,
        points: usize,
        source: &S,
    ) -> Result<Resolved<Surface>>
    where
        S: FieldSource + Sync + ?Sized,
    {
        if self.mode.is_standard_atmosphere() {
            return Ok(Ok(Surface::Standard));
        }

        let p0 = match coefficients.p0_at(group.key.valid_date) {
            Some(p0) => p0,
            None => {
                return Ok(Err(SkipReason::MissingCoefficients {
                    missing: "P0".to_string(),
                }))
            }
        };

        let found = p0.ni as usize * p0.nj as usize;
        if found != points {
            return Ok(Err(SkipReason::ShapeMismatch {
                expected: points,
                found,
            }));
        }

        let mut values = source.read_field(p0)?;
        if values.len() < points {
            return Ok(Err(SkipReason::ShapeMismatch {
                expected: points,
                found: values.len(),
            }));
        }
        values.truncate(points);
        Ok(Ok(Surface::Field(values)))
    }
}

/// Model-top pressure in hPa, from `PT` or from a 1002 `!!` (pascals).
fn eta_top<S>(
    group: &LevelGroup,
    coefficients: &GridCoefficients,
    source: &S,
) -> Result<Resolved<f64>>
where
    S: FieldSource + Sync + ?Sized,
{
    if let Some(pt) = coefficients.pt_at(group.key.valid_date) {
        let values = source.read_field(pt)?;
        return Ok(values.first().copied().ok_or_else(|| SkipReason::MissingCoefficients {
            missing: "PT values".to_string(),
        }));
    }

    if let Some(toctoc) = coefficients.toctoc_for(LevelKind::Sigma.code()) {
        let values = source.read_field(toctoc)?;
        return Ok(table_cell(&values, toctoc.ni as usize, 1, 0)
            .map(|ptop| ptop / PASCALS_PER_HECTOPASCAL)
            .ok_or_else(|| SkipReason::MissingCoefficients {
                missing: "model top in !!".to_string(),
            }));
    }

    Ok(Err(SkipReason::MissingCoefficients {
        missing: "PT or !!".to_string(),
    }))
}

/// `(ptop, pref, rcoef)` with pressures in hPa.
fn hybrid_parameters<S>(
    coefficients: &GridCoefficients,
    hy: Option<&RecordHeader>,
    source: &S,
) -> Result<Resolved<(f64, f64, f64)>>
where
    S: FieldSource + Sync + ?Sized,
{
    if let Some(toctoc) = coefficients.toctoc_for(LevelKind::Hybrid.code()) {
        let values = source.read_field(toctoc)?;
        let ni = toctoc.ni as usize;
        let row = (
            table_cell(&values, ni, 1, 0),
            table_cell(&values, ni, 1, 1),
            table_cell(&values, ni, 1, 2),
        );
        return Ok(match row {
            (Some(ptop), Some(pref), Some(rcoef)) => Ok((
                ptop / PASCALS_PER_HECTOPASCAL,
                pref / PASCALS_PER_HECTOPASCAL,
                rcoef,
            )),
            _ => Err(SkipReason::MissingCoefficients {
                missing: "ptop/pref/rcoef row in !!".to_string(),
            }),
        });
    }

    let hy = match hy {
        Some(hy) => hy,
        None => {
            return Ok(Err(SkipReason::MissingCoefficients {
                missing: "HY or !!".to_string(),
            }))
        }
    };

    let pref = f64::from(hy.ig1);
    let rcoef = f64::from(hy.ig2) / 1000.0;
    if pref <= 0.0 {
        return Ok(Err(SkipReason::Unsupported {
            message: format!("HY reference pressure {} is not positive", hy.ig1),
        }));
    }

    let ptop = match decode_level(hy.ip1) {
        Ok(level) if level.kind == LevelKind::Pressure => level.value,
        _ => match source.read_field(hy)?.first() {
            Some(ptop) => *ptop,
            None => {
                return Ok(Err(SkipReason::MissingCoefficients {
                    missing: "HY model top".to_string(),
                }))
            }
        },
    };

    Ok(Ok((ptop, pref, rcoef)))
}

/// Reference pressure (Pa) and per-`ip1` `(a, b)` pairs of a staggered `!!`.
fn staggered_table<S>(
    coefficients: &GridCoefficients,
    source: &S,
) -> Result<Resolved<(f64, HashMap<i32, (f64, f64)>)>>
where
    S: FieldSource + Sync + ?Sized,
{
    let toctoc = match coefficients.toctoc_for(LevelKind::Hybrid.code()) {
        Some(toctoc) => toctoc,
        None => {
            return Ok(Err(SkipReason::MissingCoefficients {
                missing: "!!".to_string(),
            }))
        }
    };

    let ni = toctoc.ni as usize;
    if ni != TOCTOC_COLUMNS {
        return Ok(Err(SkipReason::Unsupported {
            message: format!("staggered !! table has {} columns, expected 3", ni),
        }));
    }

    let values = source.read_field(toctoc)?;
    let pref_pa = match table_cell(&values, ni, 1, 1) {
        Some(pref) if pref > 0.0 => pref,
        _ => {
            return Ok(Err(SkipReason::MissingCoefficients {
                missing: "reference pressure in !!".to_string(),
            }))
        }
    };

    let rows = values.len() / ni;
    let table = (FIRST_STAGGERED_ROW..rows)
        .map(|row| {
            let base = row * ni;
            (
                values[base].round() as i32,
                (values[base + 1], values[base + 2]),
            )
        })
        .collect();

    Ok(Ok((pref_pa, table)))
}

fn table_cell(values: &[f64], ni: usize, row: usize, column: usize) -> Option<f64> {
    if column >= ni {
        return None;
    }
    values.get(row * ni + column).copied()
}

/// Compute pressure fields for `records`, reading coefficients through `source`.
pub fn compute_pressure<S>(
    records: &[RecordHeader],
    source: &S,
    mode: PressureMode,
) -> Result<PressureReport>
where
    S: FieldSource + Sync + ?Sized,
{
    PressureEngine::with_mode(mode).compute(records, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_level;
    use crate::models::{GridId, LevelStyle};
    use crate::readers::CoefficientStore;

    const NI: u32 = 2;
    const NJ: u32 = 2;

    fn level_record(nomvar: &str, value: f64, kind: LevelKind) -> RecordHeader {
        let ip1 = encode_level(value, kind, LevelStyle::Extended).unwrap();
        RecordHeader::builder(nomvar)
            .shape(NI, NJ, 1)
            .ip(ip1, 0, 0)
            .ig(100, 200, 0, 0)
            .build()
            .unwrap()
    }

    fn p0(store: &mut CoefficientStore, values: Vec<f64>) -> RecordHeader {
        let record = RecordHeader::builder("P0")
            .shape(NI, NJ, 1)
            .ig(100, 200, 0, 0)
            .build()
            .unwrap();
        store.insert(&record, values);
        record
    }

    fn toctoc(store: &mut CoefficientStore, vcode: u32, ni: u32, values: Vec<f64>) -> RecordHeader {
        let nj = values.len() as u32 / ni;
        let record = RecordHeader::builder("!!")
            .shape(ni, nj, 1)
            .ip(100, 200, 0)
            .ig(vcode, 0, 0, 0)
            .data_type(5, 64)
            .build()
            .unwrap();
        store.insert(&record, values);
        record
    }

    fn only_field(report: &PressureReport) -> &PressureField {
        assert_eq!(report.fields.len(), 1, "warnings: {:?}", report.warnings);
        &report.fields[0]
    }

    #[test]
    fn test_sigma_standard_atmosphere_at_085() {
        let mut store = CoefficientStore::new();
        let records = vec![
            level_record("TT", 0.85, LevelKind::Sigma),
            p0(&mut store, vec![1000.0; 4]),
        ];

        let report = compute_pressure(&records, &store, PressureMode::StandardAtmosphere).unwrap();
        let field = only_field(&report);

        assert_eq!(field.coordinate, VerticalCoordinateType::Sigma);
        assert!(field.standard_atmosphere);
        assert_eq!(field.unit, PressureUnit::Hectopascal);
        for value in &field.values {
            assert!((value - 861.2625).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sigma_uses_surface_pressure() {
        let mut store = CoefficientStore::new();
        let records = vec![
            level_record("TT", 0.5, LevelKind::Sigma),
            p0(&mut store, vec![1000.0, 980.0, 960.0, 940.0]),
        ];

        let report = compute_pressure(&records, &store, PressureMode::Analytic).unwrap();
        assert_eq!(only_field(&report).values, vec![500.0, 490.0, 480.0, 470.0]);
    }

    #[test]
    fn test_pressure_levels_are_constant_fields() {
        let store = CoefficientStore::new();
        let records = vec![
            level_record("TT", 850.0, LevelKind::Pressure),
            level_record("TT", 250.0, LevelKind::Pressure),
        ];

        let report = compute_pressure(&records, &store, PressureMode::Analytic).unwrap();
        assert_eq!(report.fields.len(), 2);
        assert_eq!(report.fields[0].values, vec![250.0; 4]);
        assert_eq!(report.fields[1].values, vec![850.0; 4]);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_standard_atmosphere_is_monotonic() {
        let store = CoefficientStore::new();
        let mut records: Vec<RecordHeader> = [0.1, 0.3, 0.5, 0.7, 0.9, 1.0]
            .iter()
            .map(|v| level_record("TT", *v, LevelKind::Sigma))
            .collect();
        records.push(RecordHeader::builder("P0").ig(100, 200, 0, 0).build().unwrap());

        let report = compute_pressure(&records, &store, PressureMode::StandardAtmosphere).unwrap();
        let pressures: Vec<f64> = report.fields.iter().map(|f| f.values[0]).collect();
        assert_eq!(pressures.len(), 6);
        assert!(pressures.windows(2).all(|w| w[0] < w[1]));
        assert!((pressures[5] - STANDARD_SURFACE_PRESSURE_HPA).abs() < 1e-9);

        let store = CoefficientStore::new();
        let records: Vec<RecordHeader> = [100.0, 250.0, 500.0, 850.0, 1000.0]
            .iter()
            .map(|v| level_record("TT", *v, LevelKind::Pressure))
            .collect();
        let report = compute_pressure(&records, &store, PressureMode::StandardAtmosphere).unwrap();
        let pressures: Vec<f64> = report.fields.iter().map(|f| f.values[0]).collect();
        assert!(pressures.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_eta_with_pt() {
        let mut store = CoefficientStore::new();
        let pt = RecordHeader::builder("PT")
            .shape(NI, NJ, 1)
            .ig(100, 200, 0, 0)
            .build()
            .unwrap();
        store.insert(&pt, vec![10.0; 4]);
        let records = vec![
            level_record("TT", 0.5, LevelKind::Sigma),
            p0(&mut store, vec![1000.0; 4]),
            pt,
        ];

        let report = compute_pressure(&records, &store, PressureMode::Analytic).unwrap();
        let field = only_field(&report);
        assert_eq!(field.coordinate, VerticalCoordinateType::Eta);
        assert_eq!(field.values, vec![505.0; 4]);
    }

    #[test]
    fn test_eta_top_from_descriptor() {
        let mut store = CoefficientStore::new();
        let records = vec![
            level_record("TT", 0.0, LevelKind::Sigma),
            p0(&mut store, vec![1000.0; 4]),
            toctoc(&mut store, 1002, 1, vec![1002.0, 1000.0]),
        ];

        let report = compute_pressure(&records, &store, PressureMode::Analytic).unwrap();
        let field = only_field(&report);
        assert_eq!(field.coordinate, VerticalCoordinateType::Eta);
        assert_eq!(field.values, vec![10.0; 4]);
    }

    #[test]
    fn test_hybrid_from_hy() {
        let mut store = CoefficientStore::new();
        let ptop_ip1 = encode_level(10.0, LevelKind::Pressure, LevelStyle::Extended).unwrap();
        let hy = RecordHeader::builder("HY")
            .ip(ptop_ip1, 0, 0)
            .ig(800, 1600, 0, 0)
            .build()
            .unwrap();
        let records = vec![
            level_record("TT", 1.0, LevelKind::Hybrid),
            level_record("TT", 0.0125, LevelKind::Hybrid),
            p0(&mut store, vec![1000.0; 4]),
            hy,
        ];

        let report = compute_pressure(&records, &store, PressureMode::Analytic).unwrap();
        assert_eq!(report.fields.len(), 2);
        assert!(report
            .fields
            .iter()
            .all(|f| f.coordinate == VerticalCoordinateType::Hybrid));

        // At the model top the power term vanishes, at hyb = 1 pressure is p0
        assert!((report.fields[0].values[0] - 10.0).abs() < 1e-9);
        assert!((report.fields[1].values[0] - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_hybrid_from_5001_descriptor() {
        let mut store = CoefficientStore::new();
        let records = vec![
            level_record("TT", 0.5, LevelKind::Hybrid),
            p0(&mut store, vec![1000.0; 4]),
            toctoc(&mut store, 5001, 3, vec![5.0, 1.0, 0.0, 1000.0, 80_000.0, 1.0]),
        ];

        let report = compute_pressure(&records, &store, PressureMode::Analytic).unwrap();
        let field = only_field(&report);
        // rcoef 1: 800 * 0.5 + 200 * (0.5 - 0.0125) / 0.9875
        let expected = 400.0 + 200.0 * (0.4875 / 0.9875);
        assert!((field.values[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_hybrid_without_p0_yields_nothing() {
        let store = CoefficientStore::new();
        let hy = RecordHeader::builder("HY").ig(800, 1600, 0, 0).build().unwrap();
        let records = vec![level_record("TT", 0.5, LevelKind::Hybrid), hy];

        let report = compute_pressure(&records, &store, PressureMode::Analytic).unwrap();
        assert!(report.fields.is_empty());
        assert_eq!(report.warnings.len(), 1);
        let warning = &report.warnings[0];
        assert_eq!(warning.grid, GridId(100, 200));
        assert_eq!(warning.coordinate, VerticalCoordinateType::Hybrid);
        assert!(matches!(
            &warning.reason,
            SkipReason::MissingCoefficients { missing } if missing == "P0"
        ));
    }

    #[test]
    fn test_hybrid_on_sigma_levels() {
        let mut store = CoefficientStore::new();
        let ptop_ip1 = encode_level(10.0, LevelKind::Pressure, LevelStyle::Extended).unwrap();
        let hy = RecordHeader::builder("HY")
            .ip(ptop_ip1, 0, 0)
            .ig(800, 1600, 0, 0)
            .build()
            .unwrap();
        let records = vec![
            level_record("TT", 0.5, LevelKind::Sigma),
            level_record("TT", 1.0, LevelKind::Sigma),
            p0(&mut store, vec![1000.0; 4]),
            hy,
        ];

        let report = compute_pressure(&records, &store, PressureMode::Analytic).unwrap();
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(report.fields.len(), 2);
        assert!(report
            .fields
            .iter()
            .all(|f| f.coordinate == VerticalCoordinateType::Hybrid));

        // Sigma levels are mapped onto hybrid as eta_top + s (1 - eta_top)
        let eta_top = 10.0 / 800.0;
        let hyb = eta_top + 0.5 * (1.0 - eta_top);
        let expected = 800.0 * hyb + 200.0 * 0.5f64.powf(1.6);
        assert!((report.fields[0].values[0] - expected).abs() < 1e-9);
        assert!((report.fields[1].values[0] - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_p0_field_is_a_skip_warning() {
        let mut store = CoefficientStore::new();
        let records = vec![
            level_record("TT", 0.5, LevelKind::Sigma),
            p0(&mut store, vec![1000.0, 990.0]),
        ];

        let report = compute_pressure(&records, &store, PressureMode::Analytic).unwrap();
        assert!(report.fields.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            report.warnings[0].reason,
            SkipReason::ShapeMismatch { expected: 4, found: 2 }
        ));
    }

    #[test]
    fn test_p0_at_other_date_is_a_skip_warning() {
        let mut store = CoefficientStore::new();
        let late_p0 = RecordHeader::builder("P0")
            .shape(NI, NJ, 1)
            .ig(100, 200, 0, 0)
            .date(442_998_800, 3600, 6)
            .build()
            .unwrap();
        store.insert(&late_p0, vec![1000.0; 4]);
        let records = vec![level_record("TT", 0.5, LevelKind::Sigma), late_p0];

        let report = compute_pressure(&records, &store, PressureMode::Analytic).unwrap();
        assert!(report.fields.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].grid, GridId(100, 200));
        assert!(matches!(
            &report.warnings[0].reason,
            SkipReason::MissingCoefficients { missing } if missing == "P0"
        ));
    }

    #[test]
    fn test_p0_shape_mismatch_is_a_skip_warning() {
        let mut store = CoefficientStore::new();
        let p0 = RecordHeader::builder("P0")
            .shape(3, 3, 1)
            .ig(100, 200, 0, 0)
            .build()
            .unwrap();
        store.insert(&p0, vec![1000.0; 9]);
        let records = vec![level_record("TT", 0.5, LevelKind::Sigma), p0];

        let report = compute_pressure(&records, &store, PressureMode::Analytic).unwrap();
        assert!(report.fields.is_empty());
        assert!(matches!(
            report.warnings[0].reason,
            SkipReason::ShapeMismatch { expected: 4, found: 9 }
        ));
    }

    #[test]
    fn test_staggered_table_lookup() {
        let mut store = CoefficientStore::new();
        let thermo = level_record("TT", 0.5, LevelKind::Hybrid);
        let missing = level_record("TT", 0.7, LevelKind::Hybrid);
        let a = (50_000.0f64).ln();
        let table = vec![
            5.0, 2.0, 0.0, // kind, version
            1000.0, 100_000.0, 1.0, // ptop, pref, rcoef1
            1.0, 0.0, 0.0, // rcoef2
            f64::from(thermo.ip1), a, 1.0,
        ];
        let records = vec![
            thermo,
            missing,
            p0(&mut store, vec![1000.0; 4]),
            toctoc(&mut store, 5002, 3, table),
        ];

        let report = compute_pressure(&records, &store, PressureMode::Analytic).unwrap();
        let field = only_field(&report);
        assert_eq!(field.coordinate, VerticalCoordinateType::HybridStaggered);
        // exp(ln(50000) + ln(1000 * 100 / 100000)) / 100
        assert!((field.values[0] - 500.0).abs() < 1e-6);
        assert_eq!(report.warnings.len(), 1);

        let report = compute_pressure(&records, &store, PressureMode::StandardAtmosphere).unwrap();
        let expected = (a + (101_325.0f64 / 100_000.0).ln()).exp() / 100.0;
        assert!((report.fields[0].values[0] - expected).abs() < 1e-6);
    }
}
