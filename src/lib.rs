pub mod analyzers;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod processors;
pub mod readers;
pub mod utils;
pub mod writers;

pub use codec::{decode_level, encode_level};
pub use config::ProcessorConfig;
pub use error::{ProcessingError, Result};
pub use processors::{classify, compute_pressure};
pub use readers::{open_container, Container};
pub use writers::ContainerWriter;
