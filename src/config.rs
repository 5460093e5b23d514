use crate::error::Result;
use crate::models::PressureMode;
use crate::utils::constants::{CONFIG_ENV_PREFIX, DEFAULT_CHUNK_SIZE, DEFAULT_OUTPUT_NOMVAR};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Processing settings shared by the CLI and the multi-file processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProcessorConfig {
    #[validate(range(min = 1))]
    pub max_workers: usize,

    pub standard_atmosphere: bool,

    pub use_mmap: bool,

    /// Records per batch when bound-checking payloads
    #[validate(range(min = 1))]
    pub chunk_size: usize,

    #[validate(length(min = 1, max = 4))]
    pub output_nomvar: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get(),
            standard_atmosphere: false,
            use_mmap: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            output_nomvar: DEFAULT_OUTPUT_NOMVAR.to_string(),
        }
    }
}

impl ProcessorConfig {
    /// Defaults, then the optional file, then `STDFILE_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(CONFIG_ENV_PREFIX).try_parsing(true),
        );

        let config: ProcessorConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn pressure_mode(&self) -> PressureMode {
        PressureMode::from_flag(self.standard_atmosphere)
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_standard_atmosphere(mut self, standard_atmosphere: bool) -> Self {
        self.standard_atmosphere = standard_atmosphere;
        self
    }
}
