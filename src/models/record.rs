use serde::{Deserialize, Serialize};

use crate::codec::{decode_level, BitReader, BitWriter};
use crate::error::{ProcessingError, Result};
use crate::models::{DateStamp, Level};
use crate::utils::constants::{
    DELETED_STATUS, DELETED_STATUS_MASK, GRID_DESCRIPTOR_NOMVARS, META_NOMVARS,
    RECORD_HEADER_BYTES, RECORD_HEADER_WORDS, WORD_BYTES,
};

/// Status byte written for live entries.
pub const LIVE_STATUS: u8 = 0x01;

/// Identifier shared by a data record and the descriptors of its grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridId(pub u32, pub u32);

impl std::fmt::Display for GridId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.0, self.1)
    }
}

/// A fully decoded directory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub status: u8,
    /// Payload length in 64-bit words
    pub size: u32,
    /// 1-based 64-bit word address of the payload
    pub data_address: u32,
    pub deet: u32,
    pub nbits: u8,
    pub ni: u32,
    pub grtyp: char,
    pub nj: u32,
    pub datyp: u8,
    pub nk: u32,
    pub ubc: u16,
    pub npas: u32,
    pub ig1: u32,
    pub ig2: u32,
    pub ig3: u32,
    pub ig4: u32,
    pub etiket: String,
    pub typvar: String,
    pub nomvar: String,
    pub ip1: i32,
    pub levtyp: u8,
    pub ip2: i32,
    pub ip3: i32,
    pub dateo: u32,
    /// XOR of the 18 raw header words
    pub checksum: u32,
    /// Byte position of the entry inside its file
    pub offset: u64,
}

impl RecordHeader {
    pub const SIZE: usize = RECORD_HEADER_BYTES;

    pub fn builder(nomvar: &str) -> RecordHeaderBuilder {
        RecordHeaderBuilder::new(nomvar)
    }

    /// Decode a 72-byte entry found at byte `offset` of the file.
    pub fn from_bytes(data: &[u8], offset: u64) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(ProcessingError::TruncatedRecord {
                offset,
                needed: Self::SIZE,
                available: data.len(),
            });
        }
        let reader = BitReader::with_base_offset(data, offset);

        let grtyp = char::from(reader.read(120, 8)? as u8);
        if !grtyp.is_ascii() {
            return Err(ProcessingError::CorruptRecord {
                offset,
                message: format!("grid type byte {:#04x} is not ASCII", grtyp as u32),
            });
        }

        let ig2 = (reader.read(248, 8)? << 16) | (reader.read(280, 8)? << 8) | reader.read(312, 8)?;

        let etiket = format!(
            "{}{}{}",
            pad_to(&reader.read_chars(320, 5)?, 5),
            pad_to(&reader.read_chars(352, 5)?, 5),
            reader.read_chars(384, 2)?
        );

        Ok(Self {
            status: reader.read(0, 8)? as u8,
            size: reader.read(8, 24)?,
            data_address: reader.read(32, 32)?,
            deet: reader.read(64, 24)?,
            nbits: reader.read(88, 8)? as u8,
            ni: reader.read(96, 24)?,
            grtyp,
            nj: reader.read(128, 24)?,
            datyp: reader.read(152, 8)? as u8,
            nk: reader.read(160, 20)?,
            ubc: reader.read(180, 12)? as u16,
            npas: reader.read(192, 26)?,
            ig4: reader.read(224, 24)?,
            ig1: reader.read(256, 24)?,
            ig3: reader.read(288, 24)?,
            ig2,
            etiket: etiket.trim_end().to_string(),
            typvar: reader.read_chars(396, 2)?,
            nomvar: reader.read_chars(416, 4)?,
            ip1: reader.read(448, 28)? as i32,
            levtyp: reader.read(476, 4)? as u8,
            ip2: reader.read(480, 28)? as i32,
            ip3: reader.read(512, 28)? as i32,
            dateo: reader.read(544, 32)?,
            checksum: record_checksum(&data[..Self::SIZE])?,
            offset,
        })
    }

    /// Encode into the 72-byte directory layout. Pad bits are zero.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = BitWriter::new(Self::SIZE);

        writer.write(0, 8, u32::from(self.status))?;
        writer.write(8, 24, self.size)?;
        writer.write(32, 32, self.data_address)?;
        writer.write(64, 24, self.deet)?;
        writer.write(88, 8, u32::from(self.nbits))?;
        writer.write(96, 24, self.ni)?;
        writer.write(120, 8, packed_grtyp(self.grtyp)?)?;
        writer.write(128, 24, self.nj)?;
        writer.write(152, 8, u32::from(self.datyp))?;
        writer.write(160, 20, self.nk)?;
        writer.write(180, 12, u32::from(self.ubc))?;
        writer.write(192, 26, self.npas)?;
        writer.write(224, 24, self.ig4)?;
        writer.write(248, 8, (self.ig2 >> 16) & 0xFF)?;
        writer.write(256, 24, self.ig1)?;
        writer.write(280, 8, (self.ig2 >> 8) & 0xFF)?;
        writer.write(288, 24, self.ig3)?;
        writer.write(312, 8, self.ig2 & 0xFF)?;

        if self.ig2 > 0xFF_FFFF {
            return Err(ProcessingError::InvalidFormat(format!(
                "ig2 {} does not fit in 24 bits",
                self.ig2
            )));
        }

        let etiket = pad_to(&self.etiket, 12);
        if etiket.chars().count() > 12 {
            return Err(ProcessingError::InvalidFormat(format!(
                "etiket '{}' is longer than 12 characters",
                self.etiket
            )));
        }
        let etiket: Vec<char> = etiket.chars().collect();
        writer.write_chars(320, 5, &etiket[0..5].iter().collect::<String>())?;
        writer.write_chars(352, 5, &etiket[5..10].iter().collect::<String>())?;
        writer.write_chars(384, 2, &etiket[10..12].iter().collect::<String>())?;
        writer.write_chars(396, 2, &self.typvar)?;
        writer.write_chars(416, 4, &self.nomvar)?;

        writer.write(448, 28, ip_field(self.ip1, "ip1")?)?;
        writer.write(476, 4, u32::from(self.levtyp))?;
        writer.write(480, 28, ip_field(self.ip2, "ip2")?)?;
        writer.write(512, 28, ip_field(self.ip3, "ip3")?)?;
        writer.write(544, 32, self.dateo)?;

        Ok(writer.into_bytes())
    }

    pub fn is_deleted(&self) -> bool {
        self.status & DELETED_STATUS_MASK != 0
    }

    pub fn mark_deleted(&mut self) {
        self.status = DELETED_STATUS;
    }

    /// Payload byte offset after the 8-byte rewind of the word address.
    pub fn data_offset(&self) -> Option<u64> {
        if self.data_address == 0 {
            None
        } else {
            Some(u64::from(self.data_address) * WORD_BYTES - WORD_BYTES)
        }
    }

    pub fn payload_bytes(&self) -> u64 {
        u64::from(self.size) * WORD_BYTES
    }

    pub fn point_count(&self) -> usize {
        self.ni as usize * self.nj as usize * self.nk.max(1) as usize
    }

    pub fn level(&self) -> Result<Level> {
        decode_level(self.ip1)
    }

    pub fn origin_date(&self) -> DateStamp {
        DateStamp(self.dateo)
    }

    /// Validity date: origin advanced by `deet * npas` seconds.
    pub fn valid_date(&self) -> DateStamp {
        self.origin_date()
            .add_seconds(i64::from(self.deet) * i64::from(self.npas))
    }

    pub fn is_meta(&self) -> bool {
        META_NOMVARS.contains(&self.nomvar.as_str())
    }

    pub fn is_grid_descriptor(&self) -> bool {
        GRID_DESCRIPTOR_NOMVARS.contains(&self.nomvar.as_str())
    }

    /// Grid this record belongs to; `None` for records that apply to every grid.
    pub fn grid_id(&self) -> Option<GridId> {
        if self.nomvar == "HY" {
            None
        } else if self.is_grid_descriptor() {
            Some(GridId(self.ip1 as u32, self.ip2 as u32))
        } else {
            Some(GridId(self.ig1, self.ig2))
        }
    }
}

/// XOR of the 18 big-endian words of a directory entry.
pub fn record_checksum(bytes: &[u8]) -> Result<u32> {
    let reader = BitReader::new(bytes);
    let mut checksum = 0u32;
    for i in 0..RECORD_HEADER_WORDS {
        checksum ^= reader.read_word(i)?;
    }
    Ok(checksum)
}

fn pad_to(text: &str, width: usize) -> String {
    format!("{:<width$}", text, width = width)
}

fn packed_grtyp(grtyp: char) -> Result<u32> {
    if grtyp.is_ascii() {
        Ok(grtyp as u32)
    } else {
        Err(ProcessingError::InvalidFormat(format!(
            "grid type '{}' is not ASCII",
            grtyp
        )))
    }
}

fn ip_field(ip: i32, name: &str) -> Result<u32> {
    if !(0..1 << 28).contains(&ip) {
        return Err(ProcessingError::InvalidFormat(format!(
            "{} value {} does not fit in 28 bits",
            name, ip
        )));
    }
    Ok(ip as u32)
}

pub struct RecordHeaderBuilder {
    nomvar: String,
    typvar: String,
    etiket: String,
    grtyp: char,
    shape: (u32, u32, u32),
    ip: (i32, i32, i32),
    ig: (u32, u32, u32, u32),
    dateo: u32,
    deet: u32,
    npas: u32,
    datyp: u8,
    nbits: u8,
    deleted: bool,
}

impl RecordHeaderBuilder {
    pub fn new(nomvar: &str) -> Self {
        Self {
            nomvar: nomvar.to_string(),
            typvar: "P".to_string(),
            etiket: String::new(),
            grtyp: 'X',
            shape: (1, 1, 1),
            ip: (0, 0, 0),
            ig: (0, 0, 0, 0),
            dateo: 0,
            deet: 0,
            npas: 0,
            datyp: 5,
            nbits: 32,
            deleted: false,
        }
    }

    pub fn typvar(mut self, typvar: &str) -> Self {
        self.typvar = typvar.to_string();
        self
    }

    pub fn etiket(mut self, etiket: &str) -> Self {
        self.etiket = etiket.to_string();
        self
    }

    pub fn grtyp(mut self, grtyp: char) -> Self {
        self.grtyp = grtyp;
        self
    }

    pub fn shape(mut self, ni: u32, nj: u32, nk: u32) -> Self {
        self.shape = (ni, nj, nk);
        self
    }

    pub fn ip(mut self, ip1: i32, ip2: i32, ip3: i32) -> Self {
        self.ip = (ip1, ip2, ip3);
        self
    }

    pub fn ig(mut self, ig1: u32, ig2: u32, ig3: u32, ig4: u32) -> Self {
        self.ig = (ig1, ig2, ig3, ig4);
        self
    }

    pub fn date(mut self, dateo: u32, deet: u32, npas: u32) -> Self {
        self.dateo = dateo;
        self.deet = deet;
        self.npas = npas;
        self
    }

    pub fn data_type(mut self, datyp: u8, nbits: u8) -> Self {
        self.datyp = datyp;
        self.nbits = nbits;
        self
    }

    pub fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    /// Build the header and validate every field against its bit width.
    pub fn build(self) -> Result<RecordHeader> {
        if self.nomvar.trim().is_empty() {
            return Err(ProcessingError::InvalidFormat(
                "nomvar must not be empty".to_string(),
            ));
        }

        let mut header = RecordHeader {
            status: if self.deleted { DELETED_STATUS } else { LIVE_STATUS },
            size: 0,
            data_address: 0,
            deet: self.deet,
            nbits: self.nbits,
            ni: self.shape.0,
            grtyp: self.grtyp,
            nj: self.shape.1,
            datyp: self.datyp,
            nk: self.shape.2,
            ubc: 0,
            npas: self.npas,
            ig1: self.ig.0,
            ig2: self.ig.1,
            ig3: self.ig.2,
            ig4: self.ig.3,
            etiket: self.etiket.trim_end().to_uppercase(),
            typvar: self.typvar.trim_end().to_uppercase(),
            nomvar: self.nomvar.trim_end().to_uppercase(),
            ip1: self.ip.0,
            levtyp: 0,
            ip2: self.ip.1,
            ip3: self.ip.2,
            dateo: self.dateo,
            checksum: 0,
            offset: 0,
        };

        header.checksum = record_checksum(&header.to_bytes()?)?;
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordHeader {
        RecordHeader::builder("TT")
            .etiket("R1_V710_N")
            .shape(10, 20, 1)
            .ip(12000, 6, 0)
            .ig(1234, 0x0A_0B0C, 77, 88)
            .date(442_998_800, 300, 12)
            .build()
            .unwrap()
    }

    #[test]
    fn test_header_bytes_round_trip() {
        let header = sample();
        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), RecordHeader::SIZE);

        let decoded = RecordHeader::from_bytes(&bytes, 0).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.nomvar, "TT");
        assert_eq!(decoded.etiket, "R1_V710_N");
        assert_eq!(decoded.typvar, "P");
    }

    #[test]
    fn test_ig2_is_assembled_from_three_bytes() {
        let header = sample();
        let bytes = header.to_bytes().unwrap();

        // ig2a lives in the low byte of word 7, ig2b of word 8, ig2c of word 9
        assert_eq!(bytes[31], 0x0A);
        assert_eq!(bytes[35], 0x0B);
        assert_eq!(bytes[39], 0x0C);
        assert_eq!(&bytes[28..31], &[0x00, 0x00, 88]);
        assert_eq!(&bytes[32..35], &[0x00, 0x04, 0xD2]);

        let decoded = RecordHeader::from_bytes(&bytes, 0).unwrap();
        assert_eq!(decoded.ig2, 0x0A_0B0C);
        assert_eq!(decoded.ig1, 1234);
        assert_eq!(decoded.ig4, 88);
    }

    #[test]
    fn test_twelve_character_etiket() {
        let header = RecordHeader::builder("P0")
            .etiket("ABCDEFGHIJKL")
            .build()
            .unwrap();
        let decoded = RecordHeader::from_bytes(&header.to_bytes().unwrap(), 0).unwrap();
        assert_eq!(decoded.etiket, "ABCDEFGHIJKL");

        assert!(RecordHeader::builder("P0")
            .etiket("ABCDEFGHIJKLM")
            .build()
            .is_err());
    }

    #[test]
    fn test_data_offset_rewinds_one_word() {
        let mut header = sample();
        header.data_address = 27;
        assert_eq!(header.data_offset(), Some(208));
        header.data_address = 0;
        assert_eq!(header.data_offset(), None);
    }

    #[test]
    fn test_grid_identifiers() {
        let data = sample();
        assert_eq!(data.grid_id(), Some(GridId(1234, 0x0A_0B0C)));

        let descriptor = RecordHeader::builder("!!").ip(1234, 5, 0).build().unwrap();
        assert_eq!(descriptor.grid_id(), Some(GridId(1234, 5)));
        assert!(descriptor.is_meta());

        let hy = RecordHeader::builder("HY").build().unwrap();
        assert_eq!(hy.grid_id(), None);
    }

    #[test]
    fn test_checksum_tracks_every_word() {
        let header = sample();
        let mut bytes = header.to_bytes().unwrap();
        let original = record_checksum(&bytes).unwrap();
        assert_eq!(original, header.checksum);

        bytes[70] ^= 0x01;
        assert_ne!(record_checksum(&bytes).unwrap(), original);
    }

    #[test]
    fn test_ip_fields_are_limited_to_28_bits() {
        let too_large = RecordHeader::builder("TT").ip(1 << 28, 0, 0).build();
        assert!(too_large.is_err());
        let negative = RecordHeader::builder("TT").ip(-1, 0, 0).build();
        assert!(negative.is_err());
    }

    #[test]
    fn test_deleted_status() {
        let header = RecordHeader::builder("TT").deleted(true).build().unwrap();
        assert!(header.is_deleted());
        assert!(!sample().is_deleted());
    }
}
