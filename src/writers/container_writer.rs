use crate::codec::{encode_ieee, encode_level};
use crate::error::{ProcessingError, Result};
use crate::models::{
    offset_to_address, record_checksum, ChunkHeader, DataType, FileHeader, LevelStyle,
    PressureField, RecordHeader,
};
use crate::utils::constants::{
    CHUNK_PAGE_BYTES, DEFAULT_BUFFER_SIZE, DEFAULT_OUTPUT_NOMVAR, ENTRIES_PER_CHUNK, FILE_HEADER_BYTES,
    RECORD_HEADER_BYTES, WORD_BYTES,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Builds a complete container in memory.
///
/// Directory pages follow the file header back to back, payloads follow the
/// last page. Every page spans the full 256-entry size even when partly used.
pub struct ContainerWriter {
    entries: Vec<(RecordHeader, Vec<u8>)>,
    output_nomvar: String,
    level_style: LevelStyle,
}

impl Default for ContainerWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerWriter {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            output_nomvar: DEFAULT_OUTPUT_NOMVAR.to_string(),
            level_style: LevelStyle::Extended,
        }
    }

    pub fn with_output_nomvar(mut self, nomvar: &str) -> Self {
        self.output_nomvar = nomvar.to_string();
        self
    }

    pub fn with_level_style(mut self, style: LevelStyle) -> Self {
        self.level_style = style;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queue a record whose payload is `values` in the header's data type.
    pub fn add_record(&mut self, header: RecordHeader, values: &[f64]) -> Result<()> {
        let expected = header.point_count();
        if values.len() != expected {
            return Err(ProcessingError::InvalidFormat(format!(
                "{} values supplied for a {}x{}x{} record",
                values.len(),
                header.ni,
                header.nj,
                header.nk
            )));
        }

        let datyp = DataType::from_code(header.datyp);
        if datyp.base != 5 || datyp.compressed {
            return Err(ProcessingError::UnsupportedDatyp {
                datyp: header.datyp,
                nbits: header.nbits,
            });
        }

        let payload = encode_ieee(values, header.nbits)?;
        self.entries.push((header, payload));
        Ok(())
    }

    /// Queue a computed pressure field, re-encoding its level into `ip1`.
    pub fn add_pressure_field(&mut self, field: &PressureField) -> Result<()> {
        let ip1 = encode_level(field.level.value, field.level.kind, self.level_style)?;
        let source = &field.source;

        let header = RecordHeader::builder(&self.output_nomvar)
            .typvar(&source.typvar)
            .etiket(&source.etiket)
            .grtyp(source.grtyp)
            .shape(field.ni, field.nj, 1)
            .ip(ip1, source.ip2, source.ip3)
            .ig(source.ig1, source.ig2, source.ig3, source.ig4)
            .date(source.dateo, source.deet, source.npas)
            .data_type(5, 32)
            .build()?;

        self.add_record(header, &field.values)
    }

    /// Lay out the header, directory pages and payloads.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let chunk_count = self.entries.len().div_ceil(ENTRIES_PER_CHUNK);
        let directory_end = FILE_HEADER_BYTES + chunk_count * CHUNK_PAGE_BYTES;

        // Assign payload addresses and seal each entry's checksum
        let mut payload_offset = directory_end as u64;
        let mut headers = Vec::with_capacity(self.entries.len());
        for (header, payload) in &self.entries {
            let mut header = header.clone();
            header.data_address = offset_to_address(payload_offset)?;
            header.size = (payload.len() as u64 / WORD_BYTES) as u32;
            let bytes = header.to_bytes()?;
            header.checksum = record_checksum(&bytes)?;
            payload_offset += payload.len() as u64;
            headers.push((header, bytes));
        }

        let mut file_header = FileHeader::new();
        file_header.file_size_words = (payload_offset / WORD_BYTES) as u32;
        file_header.chunk_count = chunk_count as u32;
        file_header.record_count = headers.iter().filter(|(h, _)| !h.is_deleted()).count() as u32;
        file_header.erased_count = headers.iter().filter(|(h, _)| h.is_deleted()).count() as u32;

        let mut out = vec![0u8; payload_offset as usize];
        let mut last_chunk_address = 0;

        for (index, page) in headers.chunks(ENTRIES_PER_CHUNK).enumerate() {
            let chunk_offset = FILE_HEADER_BYTES + index * CHUNK_PAGE_BYTES;
            let address = offset_to_address(chunk_offset as u64)?;
            let next_address = if index + 1 < chunk_count {
                offset_to_address((chunk_offset + CHUNK_PAGE_BYTES) as u64)?
            } else {
                0
            };

            let live = page
                .iter()
                .filter(|(h, _)| !h.is_deleted())
                .fold(0u32, |acc, (h, _)| acc ^ h.checksum);
            let mut chunk = ChunkHeader::new(address, next_address, page.len() as u32, 0);
            chunk.checksum = chunk.expected_checksum(live);

            out[chunk_offset..chunk_offset + ChunkHeader::SIZE].copy_from_slice(&chunk.to_bytes()?);
            for (slot, (_, bytes)) in page.iter().enumerate() {
                let start = chunk_offset + ChunkHeader::SIZE + slot * RECORD_HEADER_BYTES;
                out[start..start + RECORD_HEADER_BYTES].copy_from_slice(bytes);
            }
            last_chunk_address = address;
        }
        file_header.last_chunk_address = last_chunk_address;

        out[..FILE_HEADER_BYTES].copy_from_slice(&file_header.to_bytes()?);

        let mut cursor = directory_end;
        for (_, payload) in &self.entries {
            out[cursor..cursor + payload.len()].copy_from_slice(payload);
            cursor += payload.len();
        }

        Ok(out)
    }

    /// Write the container to `path`, replacing any existing file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let file = File::create(path)?;
        let mut writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);
        writer.write_all(&bytes)?;
        writer.flush()?;

        debug!(
            "Wrote {} records ({} bytes) to {}",
            self.entries.len(),
            bytes.len(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateStamp, GridId, Level, LevelKind, PressureUnit, VerticalCoordinateType};
    use crate::readers::Container;

    fn record(nomvar: &str) -> RecordHeader {
        RecordHeader::builder(nomvar)
            .shape(3, 1, 1)
            .ig(1, 2, 0, 0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_container() {
        let bytes = ContainerWriter::new().to_bytes().unwrap();
        assert_eq!(bytes.len(), FILE_HEADER_BYTES);

        let mut container = Container::open(bytes).unwrap();
        assert!(container.records().unwrap().is_empty());
        assert_eq!(container.header().chunk_count, 0);
    }

    #[test]
    fn test_records_spill_into_linked_chunks() {
        let mut writer = ContainerWriter::new();
        for i in 0..300 {
            let header = RecordHeader::builder("TT")
                .shape(1, 1, 1)
                .ip(i, 0, 0)
                .build()
                .unwrap();
            writer.add_record(header, &[f64::from(i)]).unwrap();
        }

        let mut container = Container::open(writer.to_bytes().unwrap()).unwrap();
        assert_eq!(container.header().chunk_count, 2);
        assert_eq!(container.header().record_count, 300);

        let first = container.next_chunk().unwrap().unwrap();
        assert_eq!(first.nrecs, 256);
        assert_eq!(first.next_offset(), Some((FILE_HEADER_BYTES + CHUNK_PAGE_BYTES) as u64));

        let records = container.records().unwrap();
        assert_eq!(records.len(), 300);
        assert_eq!(records[299].ip1, 299);
        assert_eq!(container.read_values(&records[299]).unwrap(), vec![299.0]);
        assert_eq!(
            container.header().last_chunk_address,
            offset_to_address((FILE_HEADER_BYTES + CHUNK_PAGE_BYTES) as u64).unwrap()
        );
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let mut writer = ContainerWriter::new();
        assert!(writer.add_record(record("TT"), &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_pressure_field_is_persisted_with_encoded_level() {
        let source = record("TT");
        let field = PressureField {
            grid: GridId(1, 2),
            coordinate: VerticalCoordinateType::Sigma,
            level: Level::new(0.85, LevelKind::Sigma),
            ip1: source.ip1,
            valid_date: DateStamp(0),
            ni: 3,
            nj: 1,
            values: vec![861.25, 861.25, 861.25],
            unit: PressureUnit::Hectopascal,
            standard_atmosphere: true,
            source,
        };

        let mut writer = ContainerWriter::new().with_output_nomvar("PX");
        writer.add_pressure_field(&field).unwrap();

        let mut container = Container::open(writer.to_bytes().unwrap()).unwrap();
        let px = container.records().unwrap().remove(0);
        assert_eq!(px.nomvar, "PX");
        assert_eq!(px.level().unwrap(), Level::new(0.85, LevelKind::Sigma));
        assert_eq!(px.grid_id(), Some(GridId(1, 2)));
        assert_eq!(container.read_values(&px).unwrap(), field.values);
    }
}
