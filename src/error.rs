use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a standard file container: {0}")]
    NotAContainerFormat(String),

    #[error("Corrupt directory chunk at byte {offset}: stored checksum {stored:#010x}, computed {computed:#010x}")]
    CorruptChunk {
        offset: u64,
        stored: u32,
        computed: u32,
    },

    #[error("Corrupt chunk structure at byte {offset}: {message}")]
    CorruptChunkStructure { offset: u64, message: String },

    #[error("Corrupt record header at byte {offset}: {message}")]
    CorruptRecord { offset: u64, message: String },

    #[error("Truncated data at byte {offset}: needed {needed} bytes, {available} available")]
    TruncatedRecord {
        offset: u64,
        needed: usize,
        available: usize,
    },

    #[error("Missing coefficients for {group}: {missing}")]
    MissingCoefficients { group: String, missing: String },

    #[error("Unsupported level kind: {0}")]
    UnsupportedKind(i32),

    #[error("Unsupported data type {datyp} with {nbits} bits")]
    UnsupportedDatyp { datyp: u8, nbits: u8 },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ProcessingError {
    /// Structural and checksum failures abort the whole read pass.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ProcessingError::MissingCoefficients { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_coefficients_is_not_fatal() {
        let err = ProcessingError::MissingCoefficients {
            group: "grid 100/200".to_string(),
            missing: "P0".to_string(),
        };
        assert!(!err.is_fatal());

        let err = ProcessingError::CorruptChunk {
            offset: 208,
            stored: 1,
            computed: 2,
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("0x00000001"));
    }
}
