pub mod coordinate;
pub mod datyp;
pub mod headers;
pub mod level;
pub mod pressure;
pub mod record;
pub mod stamp;

pub use coordinate::VerticalCoordinateType;
pub use datyp::DataType;
pub use headers::{address_to_offset, offset_to_address, ChunkHeader, FileHeader, KeyDescriptor};
pub use level::{Level, LevelKind, LevelStyle};
pub use pressure::{
    PressureField, PressureMode, PressureReport, PressureUnit, SkipReason, SkipWarning,
};
pub use record::{record_checksum, GridId, RecordHeader, RecordHeaderBuilder};
pub use stamp::DateStamp;
