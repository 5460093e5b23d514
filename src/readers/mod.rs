pub mod container_reader;
pub mod field_source;

pub use container_reader::{open_container, Container, ContainerReader, RecordIter, ScanStats};
pub use field_source::{CoefficientStore, FieldKey, FieldSource};
