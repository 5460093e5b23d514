//! File header and directory chunk header layouts.

use serde::{Deserialize, Serialize};

use crate::codec::{BitReader, BitWriter};
use crate::error::{ProcessingError, Result};
use crate::utils::constants::{
    AUX_KEYS_OFFSET, AUX_KEY_COUNT, AUX_KEY_LENGTH, CHUNK_HEADER_BYTES, CHUNK_HEADER_WORDS,
    ENTRIES_PER_CHUNK, FILE_HEADER_BYTES, FILE_HEADER_WORDS, KEY_DESCRIPTOR_BYTES,
    PRIMARY_KEYS_OFFSET, PRIMARY_KEY_COUNT, PRIMARY_KEY_LENGTH, STDR_MAGIC, WORD_BYTES, XDF_MAGIC,
};

/// Describes where one search key lives inside a directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    pub name: String,
    /// First bit of the key inside the entry
    pub first_bit: u16,
    /// Width in bits
    pub length: u8,
    pub key_type: u8,
}

impl KeyDescriptor {
    pub fn new(name: &str, first_bit: u16, length: u8, key_type: u8) -> Self {
        Self {
            name: name.to_string(),
            first_bit,
            length,
            key_type,
        }
    }

    fn read(reader: &BitReader<'_>, byte_offset: usize) -> Result<Self> {
        let base = byte_offset * 8;
        let name: String = reader
            .bytes(byte_offset, 4)?
            .iter()
            .map(|b| char::from(*b))
            .collect();

        Ok(Self {
            name: name.trim_end().to_string(),
            first_bit: reader.read(base + 32, 13)? as u16,
            length: reader.read(base + 45, 5)? as u8 + 1,
            key_type: reader.read(base + 50, 6)? as u8,
        })
    }

    fn write(&self, writer: &mut BitWriter, byte_offset: usize) -> Result<()> {
        let base = byte_offset * 8;
        let name = format!("{:<4}", self.name);
        if name.len() != 4 || !name.is_ascii() {
            return Err(ProcessingError::InvalidFormat(format!(
                "Key name '{}' must be at most 4 ASCII characters",
                self.name
            )));
        }
        for (i, byte) in name.bytes().enumerate() {
            writer.write(base + i * 8, 8, u32::from(byte))?;
        }
        if self.length == 0 {
            return Err(ProcessingError::InvalidFormat(format!(
                "Key '{}' has zero length",
                self.name
            )));
        }
        writer.write(base + 32, 13, u32::from(self.first_bit))?;
        writer.write(base + 45, 5, u32::from(self.length - 1))?;
        writer.write(base + 50, 6, u32::from(self.key_type))?;
        Ok(())
    }
}

/// Key table written by [`crate::writers::ContainerWriter`].
pub fn default_primary_keys() -> Vec<KeyDescriptor> {
    vec![
        KeyDescriptor::new("STAT", 0, 8, 0),
        KeyDescriptor::new("SIZE", 8, 24, 0),
        KeyDescriptor::new("ADDR", 32, 32, 0),
        KeyDescriptor::new("DEET", 64, 24, 0),
        KeyDescriptor::new("NBIT", 88, 8, 0),
        KeyDescriptor::new("NI", 96, 24, 0),
        KeyDescriptor::new("GTYP", 120, 8, 3),
        KeyDescriptor::new("NJ", 128, 24, 0),
        KeyDescriptor::new("DTYP", 152, 8, 0),
        KeyDescriptor::new("NK", 160, 20, 0),
        KeyDescriptor::new("NPAS", 192, 26, 0),
        KeyDescriptor::new("IG1", 256, 24, 0),
        KeyDescriptor::new("ETIK", 320, 30, 3),
        KeyDescriptor::new("NOMV", 416, 24, 3),
        KeyDescriptor::new("IP1", 448, 28, 0),
        KeyDescriptor::new("DATE", 544, 32, 0),
    ]
}

pub fn default_aux_keys() -> Vec<KeyDescriptor> {
    vec![
        KeyDescriptor::new("TYPV", 396, 12, 3),
        KeyDescriptor::new("IP2", 480, 28, 0),
    ]
}

/// The 208-byte header at the start of every container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    /// File size in 64-bit words
    pub file_size_words: u32,
    pub rewrite_count: u32,
    pub extension_count: u32,
    pub chunk_count: u32,
    /// 1-based word address of the last directory chunk
    pub last_chunk_address: u32,
    pub erased_count: u32,
    pub record_count: u32,
    pub primary_keys: Vec<KeyDescriptor>,
    pub aux_keys: Vec<KeyDescriptor>,
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl FileHeader {
    pub const SIZE: usize = FILE_HEADER_BYTES;

    pub fn new() -> Self {
        Self {
            file_size_words: (FILE_HEADER_BYTES as u64 / WORD_BYTES) as u32,
            rewrite_count: 0,
            extension_count: 0,
            chunk_count: 0,
            last_chunk_address: 0,
            erased_count: 0,
            record_count: 0,
            primary_keys: default_primary_keys(),
            aux_keys: default_aux_keys(),
        }
    }

    /// Parse and validate the signature, header length and key layout.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(ProcessingError::NotAContainerFormat(format!(
                "{} bytes is shorter than the {}-byte file header",
                data.len(),
                Self::SIZE
            )));
        }

        let reader = BitReader::new(&data[..Self::SIZE]);

        if reader.bytes(8, 4)? != XDF_MAGIC || reader.bytes(12, 4)? != STDR_MAGIC {
            return Err(ProcessingError::NotAContainerFormat(
                "missing XDF0/STDR signature".to_string(),
            ));
        }

        let header_words = reader.read(8, 24)?;
        if header_words != FILE_HEADER_WORDS {
            return Err(ProcessingError::NotAContainerFormat(format!(
                "header length is {} words, expected {}",
                header_words, FILE_HEADER_WORDS
            )));
        }

        let layout = (
            reader.read(320, 16)? as u16,
            reader.read(336, 16)? as u16,
            reader.read(352, 16)? as u16,
            reader.read(368, 16)? as u16,
        );
        let expected = (
            PRIMARY_KEY_COUNT,
            PRIMARY_KEY_LENGTH,
            AUX_KEY_COUNT,
            AUX_KEY_LENGTH,
        );
        if layout != expected {
            return Err(ProcessingError::NotAContainerFormat(format!(
                "key layout {:?} does not match {:?}",
                layout, expected
            )));
        }

        let primary_keys = (0..PRIMARY_KEY_COUNT as usize)
            .map(|i| KeyDescriptor::read(&reader, PRIMARY_KEYS_OFFSET + i * KEY_DESCRIPTOR_BYTES))
            .collect::<Result<Vec<_>>>()?;
        let aux_keys = (0..AUX_KEY_COUNT as usize)
            .map(|i| KeyDescriptor::read(&reader, AUX_KEYS_OFFSET + i * KEY_DESCRIPTOR_BYTES))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            file_size_words: reader.read_word(4)?,
            rewrite_count: reader.read_word(5)?,
            extension_count: reader.read_word(6)?,
            chunk_count: reader.read_word(7)?,
            last_chunk_address: reader.read_word(8)?,
            erased_count: reader.read_word(12)?,
            record_count: reader.read_word(13)?,
            primary_keys,
            aux_keys,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.primary_keys.len() != PRIMARY_KEY_COUNT as usize
            || self.aux_keys.len() != AUX_KEY_COUNT as usize
        {
            return Err(ProcessingError::InvalidFormat(format!(
                "expected {} primary and {} auxiliary keys, got {} and {}",
                PRIMARY_KEY_COUNT,
                AUX_KEY_COUNT,
                self.primary_keys.len(),
                self.aux_keys.len()
            )));
        }

        let mut writer = BitWriter::new(Self::SIZE);
        writer.write(0, 8, 0)?;
        writer.write(8, 24, FILE_HEADER_WORDS)?;
        writer.write_word(1, 1)?;
        for (i, byte) in XDF_MAGIC.iter().chain(STDR_MAGIC.iter()).enumerate() {
            writer.write(64 + i * 8, 8, u32::from(*byte))?;
        }
        writer.write_word(4, self.file_size_words)?;
        writer.write_word(5, self.rewrite_count)?;
        writer.write_word(6, self.extension_count)?;
        writer.write_word(7, self.chunk_count)?;
        writer.write_word(8, self.last_chunk_address)?;
        writer.write(320, 16, u32::from(PRIMARY_KEY_COUNT))?;
        writer.write(336, 16, u32::from(PRIMARY_KEY_LENGTH))?;
        writer.write(352, 16, u32::from(AUX_KEY_COUNT))?;
        writer.write(368, 16, u32::from(AUX_KEY_LENGTH))?;
        writer.write_word(12, self.erased_count)?;
        writer.write_word(13, self.record_count)?;

        for (i, key) in self.primary_keys.iter().enumerate() {
            key.write(&mut writer, PRIMARY_KEYS_OFFSET + i * KEY_DESCRIPTOR_BYTES)?;
        }
        for (i, key) in self.aux_keys.iter().enumerate() {
            key.write(&mut writer, AUX_KEYS_OFFSET + i * KEY_DESCRIPTOR_BYTES)?;
        }

        Ok(writer.into_bytes())
    }

    pub fn file_size_bytes(&self) -> u64 {
        u64::from(self.file_size_words) * WORD_BYTES
    }
}

/// The 32-byte header opening each directory page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHeader {
    /// Byte position of the chunk inside the file
    pub offset: u64,
    /// 1-based word address the chunk claims for itself
    pub address: u32,
    /// Address of the following chunk, 0 for the last one
    pub next_address: u32,
    pub nrecs: u32,
    pub checksum: u32,
}

impl ChunkHeader {
    pub const SIZE: usize = CHUNK_HEADER_BYTES;

    pub fn new(address: u32, next_address: u32, nrecs: u32, checksum: u32) -> Self {
        Self {
            offset: address_to_offset(address).unwrap_or(0),
            address,
            next_address,
            nrecs,
            checksum,
        }
    }

    pub fn from_bytes(data: &[u8], offset: u64) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(ProcessingError::TruncatedRecord {
                offset,
                needed: Self::SIZE,
                available: data.len(),
            });
        }

        let reader = BitReader::with_base_offset(&data[..Self::SIZE], offset);
        let idtyp = reader.read(0, 8)?;
        let length = reader.read(8, 24)?;
        if idtyp != 0 || length != CHUNK_HEADER_WORDS {
            return Err(ProcessingError::CorruptChunkStructure {
                offset,
                message: format!(
                    "unexpected page type {} with length {} words",
                    idtyp, length
                ),
            });
        }

        let header = Self {
            offset,
            address: reader.read_word(1)?,
            next_address: reader.read_word(4)?,
            nrecs: reader.read_word(5)?,
            checksum: reader.read_word(6)?,
        };

        if address_to_offset(header.address) != Some(offset) {
            return Err(ProcessingError::CorruptChunkStructure {
                offset,
                message: format!("chunk claims address {}", header.address),
            });
        }
        if header.nrecs as usize > ENTRIES_PER_CHUNK {
            return Err(ProcessingError::CorruptChunkStructure {
                offset,
                message: format!(
                    "{} entries exceed the page capacity of {}",
                    header.nrecs, ENTRIES_PER_CHUNK
                ),
            });
        }

        Ok(header)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = BitWriter::new(Self::SIZE);
        writer.write(0, 8, 0)?;
        writer.write(8, 24, CHUNK_HEADER_WORDS)?;
        writer.write_word(1, self.address)?;
        writer.write_word(4, self.next_address)?;
        writer.write_word(5, self.nrecs)?;
        writer.write_word(6, self.checksum)?;
        Ok(writer.into_bytes())
    }

    pub fn next_offset(&self) -> Option<u64> {
        address_to_offset(self.next_address)
    }

    /// Value the stored checksum must equal, given the XOR of live entry checksums.
    pub fn expected_checksum(&self, live_checksums: u32) -> u32 {
        self.nrecs ^ self.next_address ^ live_checksums
    }
}

/// Byte offset of a 1-based 64-bit word address; 0 means "none".
pub fn address_to_offset(address: u32) -> Option<u64> {
    if address == 0 {
        None
    } else {
        Some((u64::from(address) - 1) * WORD_BYTES)
    }
}

pub fn offset_to_address(offset: u64) -> Result<u32> {
    if offset % WORD_BYTES != 0 {
        return Err(ProcessingError::InvalidFormat(format!(
            "Offset {} is not word aligned",
            offset
        )));
    }
    u32::try_from(offset / WORD_BYTES + 1).map_err(|_| {
        ProcessingError::InvalidFormat(format!("Offset {} is beyond addressable range", offset))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_header_layout() {
        let mut header = FileHeader::new();
        header.chunk_count = 2;
        header.record_count = 300;
        header.erased_count = 1;
        let bytes = header.to_bytes().unwrap();

        assert_eq!(bytes.len(), 208);
        assert_eq!(&bytes[8..16], b"XDF0STDR");
        assert_eq!(&bytes[1..4], &[0, 0, 26]);
        assert_eq!(&bytes[40..48], &[0, 16, 0, 9, 0, 2, 0, 1]);
        assert_eq!(&bytes[52..56], &[0, 0, 1, 44]);
        assert_eq!(&bytes[64..68], b"STAT");

        let parsed = FileHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_bad_signature_is_rejected() {
        let mut bytes = FileHeader::new().to_bytes().unwrap();
        bytes[11] = b'1';
        assert!(matches!(
            FileHeader::from_bytes(&bytes),
            Err(ProcessingError::NotAContainerFormat(_))
        ));
    }

    #[test]
    fn test_wrong_key_layout_is_rejected() {
        let mut bytes = FileHeader::new().to_bytes().unwrap();
        bytes[43] = 8;
        assert!(matches!(
            FileHeader::from_bytes(&bytes),
            Err(ProcessingError::NotAContainerFormat(_))
        ));
    }

    #[test]
    fn test_short_input_is_not_a_container() {
        assert!(matches!(
            FileHeader::from_bytes(&[0u8; 100]),
            Err(ProcessingError::NotAContainerFormat(_))
        ));
    }

    #[test]
    fn test_chunk_header_addresses() {
        let header = ChunkHeader::new(27, 0, 3, 0xDEAD_BEEF);
        assert_eq!(header.offset, 208);
        assert_eq!(header.next_offset(), None);

        let bytes = header.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x09, 0x04]);
        assert_eq!(ChunkHeader::from_bytes(&bytes, 208).unwrap(), header);

        // The same bytes found elsewhere contradict the self address
        assert!(matches!(
            ChunkHeader::from_bytes(&bytes, 216),
            Err(ProcessingError::CorruptChunkStructure { .. })
        ));
    }

    #[test]
    fn test_address_conversion() {
        assert_eq!(address_to_offset(0), None);
        assert_eq!(address_to_offset(1), Some(0));
        assert_eq!(offset_to_address(208).unwrap(), 27);
        assert!(offset_to_address(209).is_err());
    }
}
