use crate::config::ProcessorConfig;
use crate::error::{ProcessingError, Result};
use crate::processors::{ContainerOutcome, ParallelProcessor};
use crate::readers::ContainerReader;
use crate::utils::progress::ProgressReporter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Result of one file; a failure here does not affect the other files.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<ContainerOutcome>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Processes many containers concurrently, one blocking task per file.
pub struct MultiFileProcessor {
    config: ProcessorConfig,
}

impl MultiFileProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Process every path, returning outcomes in input order.
    pub async fn process_files(
        &self,
        paths: Vec<PathBuf>,
        progress: Option<&ProgressReporter>,
    ) -> Result<Vec<FileOutcome>> {
        let total = paths.len();
        let (workers, threads_per_file) = split_workers(self.config.max_workers, total);
        info!(
            "Processing {} files with up to {} workers, {} threads each",
            total, workers, threads_per_file
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut join_set = JoinSet::new();

        for (index, path) in paths.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let config = self.config.clone().with_max_workers(threads_per_file);

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ProcessingError::Config(e.to_string()))?;

                let task_path = path.clone();
                let result =
                    tokio::task::spawn_blocking(move || process_file(&task_path, &config)).await?;

                Ok::<_, ProcessingError>((index, FileOutcome { path, result }))
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = join_set.join_next().await {
            let (index, outcome) = joined??;
            if let Err(e) = &outcome.result {
                warn!("{}: {}", outcome.path.display(), e);
            }
            outcomes.push((index, outcome));

            if let Some(p) = progress {
                p.update(outcomes.len() as u64);
            }
        }

        if let Some(p) = progress {
            p.finish_with_message(&format!("Processed {} files", total));
        }

        outcomes.sort_by_key(|(index, _)| *index);
        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }
}

/// Concurrent files and rayon threads per file, keeping their product
/// within `max_workers`.
fn split_workers(max_workers: usize, files: usize) -> (usize, usize) {
    let max_workers = max_workers.max(1);
    let workers = max_workers.min(files.max(1));
    (workers, (max_workers / workers).max(1))
}

/// Open, verify and compute one container with the given settings.
pub fn process_file(path: &Path, config: &ProcessorConfig) -> Result<ContainerOutcome> {
    let mut container = ContainerReader::with_mmap(config.use_mmap).open(path)?;
    ParallelProcessor::new(config.max_workers.max(1))
        .with_chunk_size(config.chunk_size)
        .with_mode(config.pressure_mode())
        .process_container(&mut container, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_level;
    use crate::models::{LevelKind, LevelStyle, RecordHeader};
    use crate::writers::ContainerWriter;
    use tempfile::TempDir;

    fn write_pressure_file(dir: &Path, name: &str) -> PathBuf {
        let mut writer = ContainerWriter::new();
        let ip1 = encode_level(500.0, LevelKind::Pressure, LevelStyle::Extended).unwrap();
        let header = RecordHeader::builder("TT").ip(ip1, 0, 0).build().unwrap();
        writer.add_record(header, &[-20.0]).unwrap();

        let path = dir.join(name);
        writer.write_to(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn test_one_bad_file_does_not_fail_the_others() {
        let dir = TempDir::new().unwrap();
        let good = write_pressure_file(dir.path(), "good.std");
        let bad = dir.path().join("bad.std");
        std::fs::write(&bad, b"not a container").unwrap();
        let other = write_pressure_file(dir.path(), "other.std");

        let processor = MultiFileProcessor::new(ProcessorConfig::default().with_max_workers(2));
        let outcomes = processor
            .process_files(vec![good.clone(), bad.clone(), other], None)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].path, good);
        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[1].path, bad);
        assert!(matches!(
            outcomes[1].result,
            Err(ProcessingError::NotAContainerFormat(_))
        ));
        assert!(outcomes[2].is_ok());

        let fields = &outcomes[0].result.as_ref().unwrap().pressure.fields;
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].values, vec![500.0]);
    }

    #[test]
    fn test_threads_are_shared_between_files() {
        assert_eq!(split_workers(8, 2), (2, 4));
        assert_eq!(split_workers(8, 20), (8, 1));
        assert_eq!(split_workers(8, 3), (3, 2));
        assert_eq!(split_workers(1, 5), (1, 1));
        assert_eq!(split_workers(4, 0), (1, 4));
        for files in 1..12 {
            let (workers, threads) = split_workers(8, files);
            assert!(workers * threads <= 8);
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_an_io_error() {
        let processor = MultiFileProcessor::new(ProcessorConfig::default());
        let outcomes = processor
            .process_files(vec![PathBuf::from("/nonexistent/file.std")], None)
            .await
            .unwrap();
        assert!(matches!(outcomes[0].result, Err(ProcessingError::Io(_))));
    }
}
