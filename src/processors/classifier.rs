use crate::error::Result;
use crate::models::{GridId, LevelKind, RecordHeader, VerticalCoordinateType};
use std::collections::{BTreeMap, HashMap};

/// Vertical code meaning "no `!!` descriptor".
pub const NO_VCODE: i32 = -1;

/// What was found on a grid, matched exactly against [`COORDINATE_TABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordinateSignature {
    pub kind: i32,
    pub has_toctoc: bool,
    pub has_p0: bool,
    pub has_e1: bool,
    pub has_pt: bool,
    pub has_hy: bool,
    pub has_sf: bool,
    pub vcode: i32,
}

pub struct CoordinateRule {
    pub signature: CoordinateSignature,
    pub coordinate: VerticalCoordinateType,
}

const fn rule(
    kind: i32,
    flags: [bool; 6],
    vcode: i32,
    coordinate: VerticalCoordinateType,
) -> CoordinateRule {
    CoordinateRule {
        signature: CoordinateSignature {
            kind,
            has_toctoc: flags[0],
            has_p0: flags[1],
            has_e1: flags[2],
            has_pt: flags[3],
            has_hy: flags[4],
            has_sf: flags[5],
            vcode,
        },
        coordinate,
    }
}

const T: bool = true;
const F: bool = false;

use VerticalCoordinateType::{Eta, Hybrid, HybridStaggered, Pressure, Sigma};

// flags: !!, P0, E1, PT, HY, !!SF
pub static COORDINATE_TABLE: [CoordinateRule; 16] = [
    rule(2, [F, F, F, F, F, F], NO_VCODE, Pressure),
    rule(2, [T, F, F, F, F, F], 2001, Pressure),
    rule(1, [F, T, F, F, F, F], NO_VCODE, Sigma),
    rule(1, [T, T, F, F, F, F], 1001, Sigma),
    rule(1, [F, T, F, T, F, F], NO_VCODE, Eta),
    rule(1, [T, T, F, F, F, F], 1002, Eta),
    rule(1, [T, T, F, T, F, F], 1002, Eta),
    rule(1, [F, T, T, T, F, F], NO_VCODE, Eta),
    rule(1, [F, T, F, F, T, F], NO_VCODE, Hybrid),
    rule(5, [F, T, F, F, T, F], NO_VCODE, Hybrid),
    rule(5, [T, T, F, F, F, F], 5001, Hybrid),
    rule(5, [T, T, F, F, T, F], 5001, Hybrid),
    rule(5, [T, T, F, F, F, F], 5002, HybridStaggered),
    rule(5, [T, T, F, F, F, F], 5003, HybridStaggered),
    rule(5, [T, T, F, F, F, F], 5004, HybridStaggered),
    rule(5, [T, T, F, F, F, F], 5005, HybridStaggered),
];

/// Exact lookup in the coordinate table; anything unlisted is unknown.
pub fn lookup(signature: &CoordinateSignature) -> VerticalCoordinateType {
    COORDINATE_TABLE
        .iter()
        .find(|rule| rule.signature == *signature)
        .map(|rule| rule.coordinate)
        .unwrap_or(VerticalCoordinateType::Unknown)
}

/// Names of the presence flags, in signature order.
const FLAG_NOMVARS: [&str; 6] = ["!!", "P0", "E1", "PT", "HY", "!!SF"];

impl CoordinateSignature {
    fn flags(&self) -> [bool; 6] {
        [
            self.has_toctoc,
            self.has_p0,
            self.has_e1,
            self.has_pt,
            self.has_hy,
            self.has_sf,
        ]
    }
}

/// A grid that would match a table row if some meta records were added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incomplete {
    pub coordinate: VerticalCoordinateType,
    pub missing: Vec<&'static str>,
}

/// The closest row `signature` falls short of, counting only absent records.
///
/// Signatures carrying a record no row of their kind accepts have no
/// completion and stay plainly unknown.
pub fn completion(signature: &CoordinateSignature) -> Option<Incomplete> {
    let present = signature.flags();

    COORDINATE_TABLE
        .iter()
        .filter(|rule| rule.signature.kind == signature.kind)
        .filter(|rule| !signature.has_toctoc || rule.signature.vcode == signature.vcode)
        .filter_map(|rule| {
            let wanted = rule.signature.flags();
            if present.iter().zip(&wanted).any(|(has, wants)| *has && !*wants) {
                return None;
            }
            let missing: Vec<&'static str> = FLAG_NOMVARS
                .iter()
                .zip(present.iter().zip(&wanted))
                .filter(|(_, (has, wants))| **wants && !**has)
                .map(|(name, _)| *name)
                .collect();
            Some(Incomplete {
                coordinate: rule.coordinate,
                missing,
            })
        })
        .filter(|incomplete| !incomplete.missing.is_empty())
        .min_by_key(|incomplete| incomplete.missing.len())
}

/// Meta records present on one grid.
#[derive(Debug, Clone, Default)]
pub struct GridPresence {
    pub has_p0: bool,
    pub has_e1: bool,
    pub has_pt: bool,
    pub has_sf: bool,
    /// `ig1` of every `!!` descriptor on the grid
    pub vcodes: Vec<i32>,
}

impl GridPresence {
    /// The `!!` code whose thousands digit names this level kind.
    pub fn vcode_for(&self, kind: LevelKind) -> Option<i32> {
        self.vcodes
            .iter()
            .copied()
            .find(|vcode| vcode / 1000 == kind.code())
    }

    pub fn signature(&self, kind: LevelKind, has_hy: bool) -> CoordinateSignature {
        let vcode = self.vcode_for(kind);
        CoordinateSignature {
            kind: kind.code(),
            has_toctoc: vcode.is_some(),
            has_p0: self.has_p0,
            has_e1: self.has_e1,
            has_pt: self.has_pt,
            has_hy,
            has_sf: self.has_sf,
            vcode: vcode.unwrap_or(NO_VCODE),
        }
    }
}

/// Coordinate type per (grid, level kind), computed once from a record set.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    coordinates: BTreeMap<(GridId, LevelKind), VerticalCoordinateType>,
    incomplete: BTreeMap<(GridId, LevelKind), Incomplete>,
}

impl Classification {
    pub fn get(&self, grid: GridId, kind: LevelKind) -> VerticalCoordinateType {
        self.coordinates
            .get(&(grid, kind))
            .copied()
            .unwrap_or(VerticalCoordinateType::Unknown)
    }

    /// Coordinate of a single record; meta records are always unknown.
    pub fn of_record(&self, record: &RecordHeader) -> Result<VerticalCoordinateType> {
        if record.is_meta() {
            return Ok(VerticalCoordinateType::Unknown);
        }
        let grid = match record.grid_id() {
            Some(grid) => grid,
            None => return Ok(VerticalCoordinateType::Unknown),
        };
        Ok(self.get(grid, record.level()?.kind))
    }

    /// Why an unknown (grid, kind) fell short of a coordinate, if it did.
    pub fn incomplete(&self, grid: GridId, kind: LevelKind) -> Option<&Incomplete> {
        self.incomplete.get(&(grid, kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(GridId, LevelKind), &VerticalCoordinateType)> {
        self.coordinates.iter()
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

/// Collect per-grid presence flags; the second value is whether any `HY` exists.
pub fn scan_presence(records: &[RecordHeader]) -> (HashMap<GridId, GridPresence>, bool) {
    let mut grids: HashMap<GridId, GridPresence> = HashMap::new();
    let mut has_hy = false;

    for record in records {
        let grid = match record.grid_id() {
            Some(grid) => grid,
            None => {
                has_hy |= record.nomvar == "HY";
                continue;
            }
        };
        let presence = grids.entry(grid).or_default();
        match record.nomvar.as_str() {
            "P0" => presence.has_p0 = true,
            "E1" => presence.has_e1 = true,
            "PT" => presence.has_pt = true,
            "!!SF" => presence.has_sf = true,
            "!!" => presence.vcodes.push(record.ig1 as i32),
            _ => {}
        }
    }

    (grids, has_hy)
}

/// Classify every (grid, level kind) carried by the data records.
pub fn classify(records: &[RecordHeader]) -> Result<Classification> {
    let (grids, has_hy) = scan_presence(records);
    let mut coordinates = BTreeMap::new();
    let mut incomplete = BTreeMap::new();
    let empty = GridPresence::default();

    for record in records {
        if record.is_meta() || record.is_grid_descriptor() {
            continue;
        }
        let grid = match record.grid_id() {
            Some(grid) => grid,
            None => continue,
        };

        let kind = record.level()?.kind;
        if !kind.is_classifiable() || coordinates.contains_key(&(grid, kind)) {
            continue;
        }

        let presence = grids.get(&grid).unwrap_or(&empty);
        let signature = presence.signature(kind, has_hy);
        let coordinate = lookup(&signature);
        if !coordinate.is_known() {
            if let Some(completion) = completion(&signature) {
                incomplete.insert((grid, kind), completion);
            }
        }
        coordinates.insert((grid, kind), coordinate);
    }

    Ok(Classification {
        coordinates,
        incomplete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_level;
    use crate::models::LevelStyle;

    fn data(nomvar: &str, value: f64, kind: LevelKind) -> RecordHeader {
        let ip1 = encode_level(value, kind, LevelStyle::Extended).unwrap();
        RecordHeader::builder(nomvar)
            .ip(ip1, 0, 0)
            .ig(10, 20, 0, 0)
            .build()
            .unwrap()
    }

    fn meta(nomvar: &str) -> RecordHeader {
        RecordHeader::builder(nomvar).ig(10, 20, 0, 0).build().unwrap()
    }

    fn toctoc(vcode: u32) -> RecordHeader {
        RecordHeader::builder("!!")
            .ip(10, 20, 0)
            .ig(vcode, 0, 0, 0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_every_table_row_is_reachable() {
        for rule in COORDINATE_TABLE.iter() {
            assert_eq!(lookup(&rule.signature), rule.coordinate);
        }
    }

    #[test]
    fn test_signatures_outside_the_table_are_unknown() {
        for rule in COORDINATE_TABLE.iter() {
            let mut signature = rule.signature;
            signature.has_sf = true;
            assert_eq!(lookup(&signature), VerticalCoordinateType::Unknown);

            let mut signature = rule.signature;
            signature.kind = 4;
            assert_eq!(lookup(&signature), VerticalCoordinateType::Unknown);
        }

        let staggered = CoordinateSignature {
            kind: 5,
            has_toctoc: true,
            has_p0: true,
            has_e1: false,
            has_pt: false,
            has_hy: false,
            has_sf: false,
            vcode: 5100,
        };
        assert_eq!(lookup(&staggered), VerticalCoordinateType::Unknown);
    }

    #[test]
    fn test_pressure_levels_without_meta() {
        let records = vec![data("TT", 500.0, LevelKind::Pressure)];
        let classification = classify(&records).unwrap();
        assert_eq!(
            classification.get(GridId(10, 20), LevelKind::Pressure),
            VerticalCoordinateType::Pressure
        );
    }

    #[test]
    fn test_sigma_needs_p0() {
        let records = vec![data("TT", 0.85, LevelKind::Sigma), meta("P0")];
        assert_eq!(
            classify(&records).unwrap().get(GridId(10, 20), LevelKind::Sigma),
            VerticalCoordinateType::Sigma
        );

        let records = vec![data("TT", 0.85, LevelKind::Sigma)];
        assert_eq!(
            classify(&records).unwrap().get(GridId(10, 20), LevelKind::Sigma),
            VerticalCoordinateType::Unknown
        );
    }

    #[test]
    fn test_eta_from_pt() {
        let records = vec![data("TT", 0.5, LevelKind::Sigma), meta("P0"), meta("PT")];
        assert_eq!(
            classify(&records).unwrap().get(GridId(10, 20), LevelKind::Sigma),
            VerticalCoordinateType::Eta
        );
    }

    #[test]
    fn test_hybrid_from_global_hy() {
        let hy = RecordHeader::builder("HY").ig(1000, 1600, 0, 0).build().unwrap();
        let records = vec![data("TT", 0.5, LevelKind::Hybrid), meta("P0"), hy];
        assert_eq!(
            classify(&records).unwrap().get(GridId(10, 20), LevelKind::Hybrid),
            VerticalCoordinateType::Hybrid
        );
    }

    #[test]
    fn test_sigma_levels_with_global_hy_are_hybrid() {
        let hy = RecordHeader::builder("HY").ig(800, 1600, 0, 0).build().unwrap();
        let records = vec![data("TT", 0.5, LevelKind::Sigma), meta("P0"), hy];
        assert_eq!(
            classify(&records).unwrap().get(GridId(10, 20), LevelKind::Sigma),
            VerticalCoordinateType::Hybrid
        );
    }

    #[test]
    fn test_missing_p0_is_reported_as_incomplete() {
        let hy = RecordHeader::builder("HY").ig(800, 1600, 0, 0).build().unwrap();
        let records = vec![data("TT", 0.5, LevelKind::Hybrid), hy];
        let classification = classify(&records).unwrap();

        assert_eq!(
            classification.get(GridId(10, 20), LevelKind::Hybrid),
            VerticalCoordinateType::Unknown
        );
        assert_eq!(
            classification.incomplete(GridId(10, 20), LevelKind::Hybrid),
            Some(&Incomplete {
                coordinate: VerticalCoordinateType::Hybrid,
                missing: vec!["P0"],
            })
        );

        let records = vec![data("TT", 0.85, LevelKind::Sigma)];
        let incomplete = classify(&records)
            .unwrap()
            .incomplete(GridId(10, 20), LevelKind::Sigma)
            .cloned()
            .unwrap();
        assert_eq!(incomplete.coordinate, VerticalCoordinateType::Sigma);
        assert_eq!(incomplete.missing, vec!["P0"]);
    }

    #[test]
    fn test_extra_meta_records_have_no_completion() {
        let records = vec![data("TT", 0.5, LevelKind::Sigma), meta("P0"), meta("!!SF")];
        let classification = classify(&records).unwrap();
        assert_eq!(
            classification.get(GridId(10, 20), LevelKind::Sigma),
            VerticalCoordinateType::Unknown
        );
        assert!(classification
            .incomplete(GridId(10, 20), LevelKind::Sigma)
            .is_none());
    }

    #[test]
    fn test_staggered_vcode_is_matched_by_kind() {
        // A pressure descriptor on the same grid must not shadow the hybrid one
        let records = vec![
            data("TT", 0.5, LevelKind::Hybrid),
            meta("P0"),
            toctoc(2001),
            toctoc(5002),
        ];
        let classification = classify(&records).unwrap();
        assert_eq!(
            classification.get(GridId(10, 20), LevelKind::Hybrid),
            VerticalCoordinateType::HybridStaggered
        );
    }

    #[test]
    fn test_meta_records_are_forced_unknown() {
        let records = vec![data("TT", 0.85, LevelKind::Sigma), meta("P0")];
        let classification = classify(&records).unwrap();

        assert_eq!(
            classification.of_record(&records[0]).unwrap(),
            VerticalCoordinateType::Sigma
        );
        for nomvar in [">>", "^^", "!!", "P0", "PT", "HY", "PN", "!!SF"] {
            let record = data(nomvar, 0.85, LevelKind::Sigma);
            assert_eq!(
                classification.of_record(&record).unwrap(),
                VerticalCoordinateType::Unknown,
                "{} should not be classified",
                nomvar
            );
        }
    }

    #[test]
    fn test_excluded_kinds_are_not_classified() {
        let records = vec![
            data("TT", 3.0, LevelKind::Arbitrary),
            data("TH", 300.0, LevelKind::Theta),
            meta("P0"),
        ];
        let classification = classify(&records).unwrap();
        assert!(classification.is_empty());
    }

    #[test]
    fn test_unsupported_kind_surfaces() {
        let bad = RecordHeader::builder("TT")
            .ip((7 << 24) | (4 << 20) | 1, 0, 0)
            .build()
            .unwrap();
        assert!(classify(&[bad]).is_err());
    }
}
