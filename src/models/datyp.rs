use serde::{Deserialize, Serialize};

/// Flag added to a data type when the payload carries missing values.
pub const MISSING_VALUE_FLAG: u8 = 64;
/// Flag added to a data type when the payload is compressed.
pub const COMPRESSED_FLAG: u8 = 128;

static DATYP_NAMES: [(u8, &str); 9] = [
    (0, "binary"),
    (1, "packed floating point"),
    (2, "unsigned integer"),
    (3, "character"),
    (4, "signed integer"),
    (5, "IEEE floating point"),
    (6, "packed floating point (turbo)"),
    (7, "character string"),
    (8, "complex IEEE floating point"),
];

/// A payload data type split into its base code and flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataType {
    pub base: u8,
    pub has_missing: bool,
    pub compressed: bool,
}

impl DataType {
    pub fn from_code(datyp: u8) -> Self {
        Self {
            base: datyp & !(MISSING_VALUE_FLAG | COMPRESSED_FLAG),
            has_missing: datyp & MISSING_VALUE_FLAG != 0,
            compressed: datyp & COMPRESSED_FLAG != 0,
        }
    }

    pub fn base_name(&self) -> &'static str {
        DATYP_NAMES
            .iter()
            .find(|(code, _)| *code == self.base)
            .map(|(_, name)| *name)
            .unwrap_or("unknown")
    }

    /// Types whose payload is a plain array of fixed-width numbers.
    pub fn is_uncompressed_numeric(&self) -> bool {
        !self.compressed && matches!(self.base, 2 | 4 | 5)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.compressed {
            write!(f, "compressed ")?;
        }
        write!(f, "{}", self.base_name())?;
        if self.has_missing {
            write!(f, " with missing values")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_split_from_base() {
        let datyp = DataType::from_code(5 + 64);
        assert_eq!(datyp.base, 5);
        assert!(datyp.has_missing);
        assert!(!datyp.compressed);
        assert!(datyp.is_uncompressed_numeric());

        let compressed = DataType::from_code(133);
        assert!(compressed.compressed);
        assert!(!compressed.is_uncompressed_numeric());
        assert_eq!(compressed.to_string(), "compressed IEEE floating point");
    }

    #[test]
    fn test_unknown_base() {
        assert_eq!(DataType::from_code(9).base_name(), "unknown");
        assert!(!DataType::from_code(1).is_uncompressed_numeric());
    }
}
