use crate::error::Result;
use crate::models::{DataType, RecordHeader};
use crate::processors::classify;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub total_records: usize,
    pub variables: BTreeMap<String, usize>,
    pub grid_types: BTreeMap<String, usize>,
    pub level_kinds: BTreeMap<String, usize>,
    pub data_types: BTreeMap<String, usize>,
    pub valid_dates: BTreeMap<String, usize>,
    /// Vertical coordinate per `grid kind`, e.g. `"100/200 5" -> "HYBRID"`
    pub coordinates: BTreeMap<String, String>,
    pub undecodable_levels: usize,
}

impl Inventory {
    pub fn summary(&self) -> String {
        let dates = match (self.valid_dates.keys().next(), self.valid_dates.keys().last()) {
            (Some(first), Some(last)) => format!("{} to {}", first, last),
            _ => "none".to_string(),
        };

        format!(
            "Records: {} total\n\
            Variables: {}\n\
            Grid Types: {}\n\
            Level Kinds: {}\n\
            Data Types: {}\n\
            Validity Dates: {} ({} distinct)",
            self.total_records,
            join_counts(&self.variables),
            join_counts(&self.grid_types),
            join_counts(&self.level_kinds),
            join_counts(&self.data_types),
            dates,
            self.valid_dates.len()
        )
    }

    pub fn detailed_summary(&self) -> String {
        let mut summary = self.summary();
        if !self.coordinates.is_empty() {
            summary.push_str("\n\nVertical Coordinates:");
            for (grid, coordinate) in &self.coordinates {
                summary.push_str(&format!("\n- grid {}: {}", grid, coordinate));
            }
        }
        if self.undecodable_levels > 0 {
            summary.push_str(&format!(
                "\n\nUndecodable levels: {}",
                self.undecodable_levels
            ));
        }
        summary
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn join_counts(counts: &BTreeMap<String, usize>) -> String {
    if counts.is_empty() {
        return "none".to_string();
    }
    counts
        .iter()
        .map(|(name, count)| format!("{} ({})", name, count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Counts records along the axes shown by `info`.
pub struct InventoryAnalyzer;

impl InventoryAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, records: &[RecordHeader]) -> Result<Inventory> {
        let mut inventory = Inventory {
            total_records: records.len(),
            ..Inventory::default()
        };

        for record in records {
            *inventory.variables.entry(record.nomvar.clone()).or_default() += 1;
            *inventory
                .grid_types
                .entry(record.grtyp.to_string())
                .or_default() += 1;
            *inventory
                .data_types
                .entry(DataType::from_code(record.datyp).to_string())
                .or_default() += 1;
            *inventory
                .valid_dates
                .entry(record.valid_date().to_string())
                .or_default() += 1;

            match record.level() {
                Ok(level) => {
                    let units = level.units();
                    let label = if units.is_empty() {
                        level.kind.code().to_string()
                    } else {
                        format!("{} ({})", level.kind.code(), units)
                    };
                    *inventory.level_kinds.entry(label).or_default() += 1;
                }
                Err(_) => inventory.undecodable_levels += 1,
            }
        }

        // Classification needs every level to decode
        if inventory.undecodable_levels == 0 {
            for ((grid, kind), coordinate) in classify(records)?.iter() {
                inventory
                    .coordinates
                    .insert(format!("{} {}", grid, kind), coordinate.to_string());
            }
        }

        Ok(inventory)
    }
}

impl Default for InventoryAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
