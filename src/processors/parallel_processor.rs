use crate::error::{ProcessingError, Result};
use crate::models::{PressureMode, PressureReport, RecordHeader};
use crate::processors::{IntegrityChecker, IntegrityReport, PressureEngine};
use crate::readers::Container;
use crate::utils::constants::DEFAULT_CHUNK_SIZE;
use crate::utils::progress::ProgressReporter;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// Everything produced by one pass over a container.
#[derive(Debug, Clone)]
pub struct ContainerOutcome {
    pub records: Vec<RecordHeader>,
    pub integrity: IntegrityReport,
    pub pressure: PressureReport,
}

/// Runs the verified walk and the pressure engine on a dedicated rayon pool.
pub struct ParallelProcessor {
    max_workers: usize,
    chunk_size: usize,
    mode: PressureMode,
}

impl ParallelProcessor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            chunk_size: DEFAULT_CHUNK_SIZE,
            mode: PressureMode::Analytic,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_mode(mut self, mode: PressureMode) -> Self {
        self.mode = mode;
        self
    }

    /// Verify the container, bound-check every payload and compute pressure.
    pub fn process_container(
        &self,
        container: &mut Container,
        progress: Option<&ProgressReporter>,
    ) -> Result<ContainerOutcome> {
        if let Some(p) = progress {
            p.set_message("Verifying directory chunks...");
        }

        let integrity = IntegrityChecker::new().check_container(container)?;
        let records = container.records()?;
        let container: &Container = container;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))?;

        if let Some(p) = progress {
            p.set_message(&format!("Checking {} payloads...", records.len()));
        }

        pool.install(|| {
            self.process_in_batches(
                &records,
                |batch| {
                    for record in batch {
                        container.payload(record)?;
                    }
                    Ok(())
                },
                progress,
            )
        })?;

        if let Some(p) = progress {
            p.set_message("Computing pressure...");
        }

        let engine = PressureEngine::with_mode(self.mode);
        let pressure = pool.install(|| engine.compute(&records, container))?;

        info!(
            "{} records, {} pressure fields, {} skipped groups",
            records.len(),
            pressure.fields.len(),
            pressure.warnings.len()
        );

        if let Some(p) = progress {
            p.finish_with_message(&format!("Processed {} records", records.len()));
        }

        Ok(ContainerOutcome {
            records,
            integrity,
            pressure,
        })
    }

    /// Process records in batches on the current pool
    pub fn process_in_batches<F>(
        &self,
        records: &[RecordHeader],
        batch_processor: F,
        progress: Option<&ProgressReporter>,
    ) -> Result<()>
    where
        F: Fn(&[RecordHeader]) -> Result<()> + Sync + Send,
    {
        let total_batches = records.len().div_ceil(self.chunk_size);
        let processed_batches = Arc::new(AtomicUsize::new(0));

        if let Some(p) = progress {
            p.set_message(&format!("Processing {} batches...", total_batches));
        }

        records.par_chunks(self.chunk_size).try_for_each(|batch| {
            let result = batch_processor(batch);

            let count = processed_batches.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(p) = progress {
                p.update(count as u64);
            }

            result
        })
    }
}

impl Default for ParallelProcessor {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}
