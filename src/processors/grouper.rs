use crate::error::Result;
use crate::models::{
    DateStamp, GridId, Level, RecordHeader, SkipReason, SkipWarning, VerticalCoordinateType,
};
use crate::processors::Classification;
use std::collections::{BTreeMap, HashMap};

/// Records that only carry coefficients and never become pressure levels.
const COEFFICIENT_NOMVARS: [&str; 1] = ["E1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub grid: GridId,
    pub coordinate: VerticalCoordinateType,
    pub valid_date: DateStamp,
}

/// One record per distinct `ip1`, ordered by level value.
#[derive(Debug, Clone)]
pub struct LevelGroup {
    pub key: GroupKey,
    pub levels: Vec<(Level, RecordHeader)>,
}

impl LevelGroup {
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Coefficient records available on one grid.
#[derive(Debug, Clone, Default)]
pub struct GridCoefficients {
    pub p0: Vec<RecordHeader>,
    pub pt: Vec<RecordHeader>,
    pub e1: Vec<RecordHeader>,
    pub toctoc: Vec<RecordHeader>,
}

impl GridCoefficients {
    /// Surface pressure valid at the same time as the levels.
    pub fn p0_at(&self, valid_date: DateStamp) -> Option<&RecordHeader> {
        self.p0.iter().find(|r| r.valid_date() == valid_date)
    }

    /// Model-top pressure, preferring the matching validity date.
    pub fn pt_at(&self, valid_date: DateStamp) -> Option<&RecordHeader> {
        self.pt
            .iter()
            .find(|r| r.valid_date() == valid_date)
            .or_else(|| self.pt.first())
    }

    /// The `!!` descriptor whose vertical code belongs to `kind_code`.
    pub fn toctoc_for(&self, kind_code: i32) -> Option<&RecordHeader> {
        self.toctoc
            .iter()
            .find(|r| r.ig1 as i32 / 1000 == kind_code)
    }
}

/// Data records split into pressure groups plus the coefficients they need.
#[derive(Debug, Clone, Default)]
pub struct GroupedRecords {
    pub groups: Vec<LevelGroup>,
    pub coefficients: HashMap<GridId, GridCoefficients>,
    /// Applies to every grid
    pub hy: Option<RecordHeader>,
    /// Groups left out because their grid lacks meta records
    pub skipped: Vec<SkipWarning>,
}

impl GroupedRecords {
    pub fn coefficients_for(&self, grid: GridId) -> Option<&GridCoefficients> {
        self.coefficients.get(&grid)
    }
}

pub struct RecordGrouper {
    include_unknown: bool,
}

impl Default for RecordGrouper {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordGrouper {
    pub fn new() -> Self {
        Self {
            include_unknown: false,
        }
    }

    pub fn with_include_unknown(include_unknown: bool) -> Self {
        Self { include_unknown }
    }

    /// Group data records per (grid, coordinate, validity date).
    pub fn group(
        &self,
        records: &[RecordHeader],
        classification: &Classification,
    ) -> Result<GroupedRecords> {
        let mut grouped = GroupedRecords::default();
        let mut levels: BTreeMap<GroupKey, BTreeMap<i32, (Level, RecordHeader)>> = BTreeMap::new();
        let mut skipped: BTreeMap<GroupKey, String> = BTreeMap::new();

        for record in records {
            if record.nomvar == "HY" {
                if grouped.hy.is_none() {
                    grouped.hy = Some(record.clone());
                }
                continue;
            }

            let grid = match record.grid_id() {
                Some(grid) => grid,
                None => continue,
            };

            match record.nomvar.as_str() {
                "P0" => {
                    grouped.coefficients.entry(grid).or_default().p0.push(record.clone());
                    continue;
                }
                "PT" => {
                    grouped.coefficients.entry(grid).or_default().pt.push(record.clone());
                    continue;
                }
                "E1" => {
                    grouped.coefficients.entry(grid).or_default().e1.push(record.clone());
                    continue;
                }
                "!!" => {
                    grouped
                        .coefficients
                        .entry(grid)
                        .or_default()
                        .toctoc
                        .push(record.clone());
                    continue;
                }
                _ => {}
            }

            if record.is_meta()
                || record.is_grid_descriptor()
                || COEFFICIENT_NOMVARS.contains(&record.nomvar.as_str())
            {
                continue;
            }

            let coordinate = classification.of_record(record)?;
            if !coordinate.is_known() && !self.include_unknown {
                if let Some(incomplete) = classification.incomplete(grid, record.level()?.kind) {
                    let key = GroupKey {
                        grid,
                        coordinate: incomplete.coordinate,
                        valid_date: record.valid_date(),
                    };
                    skipped
                        .entry(key)
                        .or_insert_with(|| incomplete.missing.join("/"));
                }
                continue;
            }

            let key = GroupKey {
                grid,
                coordinate,
                valid_date: record.valid_date(),
            };
            levels
                .entry(key)
                .or_default()
                .entry(record.ip1)
                .or_insert((record.level()?, record.clone()));
        }

        grouped.groups = levels
            .into_iter()
            .map(|(key, by_ip1)| {
                let mut levels: Vec<(Level, RecordHeader)> = by_ip1.into_values().collect();
                levels.sort_by(|a, b| a.0.value.total_cmp(&b.0.value));
                LevelGroup { key, levels }
            })
            .collect();

        grouped.skipped = skipped
            .into_iter()
            .map(|(key, missing)| SkipWarning {
                grid: key.grid,
                coordinate: key.coordinate,
                valid_date: key.valid_date,
                reason: SkipReason::MissingCoefficients { missing },
            })
            .collect();

        Ok(grouped)
    }
}
