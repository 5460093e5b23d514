use crate::error::{ProcessingError, Result};
use crate::models::RecordHeader;
use crate::readers::Container;
use std::collections::HashMap;

/// Supplies the decoded values of a record.
pub trait FieldSource {
    fn read_field(&self, record: &RecordHeader) -> Result<Vec<f64>>;
}

impl FieldSource for Container {
    fn read_field(&self, record: &RecordHeader) -> Result<Vec<f64>> {
        self.read_values(record)
    }
}

/// Identity of a record independent of where it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub nomvar: String,
    pub ip: (i32, i32, i32),
    pub ig: (u32, u32, u32, u32),
    pub dateo: u32,
    pub npas: u32,
}

impl FieldKey {
    pub fn of(record: &RecordHeader) -> Self {
        Self {
            nomvar: record.nomvar.clone(),
            ip: (record.ip1, record.ip2, record.ip3),
            ig: (record.ig1, record.ig2, record.ig3, record.ig4),
            dateo: record.dateo,
            npas: record.npas,
        }
    }
}

/// In-memory field values, keyed by record identity.
#[derive(Debug, Clone, Default)]
pub struct CoefficientStore {
    fields: HashMap<FieldKey, Vec<f64>>,
}

impl CoefficientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: &RecordHeader, values: Vec<f64>) {
        self.fields.insert(FieldKey::of(record), values);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FieldSource for CoefficientStore {
    fn read_field(&self, record: &RecordHeader) -> Result<Vec<f64>> {
        self.fields
            .get(&FieldKey::of(record))
            .cloned()
            .ok_or_else(|| ProcessingError::CorruptRecord {
                offset: record.offset,
                message: format!("no values stored for {}", record.nomvar),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_lookup_by_identity() {
        let p0 = RecordHeader::builder("P0").ig(1, 2, 0, 0).build().unwrap();
        let other = RecordHeader::builder("P0").ig(1, 3, 0, 0).build().unwrap();

        let mut store = CoefficientStore::new();
        store.insert(&p0, vec![1000.0]);

        assert_eq!(store.read_field(&p0).unwrap(), vec![1000.0]);
        assert!(store.read_field(&other).is_err());
        assert_eq!(store.len(), 1);
    }
}
