/// Container signatures
pub const XDF_MAGIC: &[u8; 4] = b"XDF0";
pub const STDR_MAGIC: &[u8; 4] = b"STDR";

/// File header layout
pub const FILE_HEADER_BYTES: usize = 208;
pub const FILE_HEADER_WORDS: u32 = 26; // 64-bit words
pub const PRIMARY_KEY_COUNT: u16 = 16;
pub const PRIMARY_KEY_LENGTH: u16 = 9; // 64-bit words per directory entry
pub const AUX_KEY_COUNT: u16 = 2;
pub const AUX_KEY_LENGTH: u16 = 1;
pub const PRIMARY_KEYS_OFFSET: usize = 64;
pub const AUX_KEYS_OFFSET: usize = 192;
pub const KEY_DESCRIPTOR_BYTES: usize = 8;

/// Directory chunk layout
pub const CHUNK_HEADER_BYTES: usize = 32;
pub const CHUNK_HEADER_WORDS: u32 = 2308; // 64-bit words, header plus 256 entries
pub const ENTRIES_PER_CHUNK: usize = 256;
pub const CHUNK_PAGE_BYTES: usize = CHUNK_HEADER_WORDS as usize * 8;

/// Directory entry (record header) layout
pub const RECORD_HEADER_BYTES: usize = 72;
pub const RECORD_HEADER_WORDS: usize = 18; // 32-bit words covered by the checksum
pub const DELETED_STATUS_MASK: u8 = 0x80;
pub const DELETED_STATUS: u8 = 0xFF;

/// Bytes per addressing unit; addresses are 1-based 64-bit word indices
pub const WORD_BYTES: u64 = 8;

/// Meta record names describing grids and vertical coordinates
pub const META_NOMVARS: [&str; 8] = [">>", "^^", "!!", "P0", "PT", "HY", "PN", "!!SF"];
pub const GRID_DESCRIPTOR_NOMVARS: [&str; 4] = [">>", "^^", "^>", "!!"];

/// Pressure reconstruction
pub const STANDARD_SURFACE_PRESSURE_HPA: f64 = 1013.25;
pub const PASCALS_PER_HECTOPASCAL: f64 = 100.0;
pub const DEFAULT_OUTPUT_NOMVAR: &str = "PX";

/// Level codec
pub const LEVEL_DECIMALS: i32 = 6;
pub const LEGACY_IP_MAX: i32 = 32767;

/// Processing defaults
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB
pub const CONFIG_ENV_PREFIX: &str = "STDFILE";
