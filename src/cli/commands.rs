use crate::analyzers::InventoryAnalyzer;
use crate::cli::args::{Cli, Commands};
use crate::config::ProcessorConfig;
use crate::error::{ProcessingError, Result};
use crate::processors::{IntegrityChecker, MultiFileProcessor};
use crate::readers::ContainerReader;
use crate::utils::progress::ProgressReporter;
use crate::writers::ContainerWriter;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use validator::Validate;

pub fn init_logging(verbose: bool, log_level: &str) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ProcessingError::Config(e.to_string()))
}

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, &cli.log_level)?;

    let config = ProcessorConfig::load(cli.config.as_deref())?;
    info!("Loaded configuration: {:?}", config);

    match cli.command {
        Commands::Inspect { file, mmap } => {
            println!("Inspecting: {}", file.display());

            let progress = ProgressReporter::new_spinner("Walking directory chunks...", false);
            let mut container =
                ContainerReader::with_mmap(mmap || config.use_mmap).open(&file)?;

            let checker = IntegrityChecker::new();
            let report = checker.check_container(&mut container)?;
            progress.finish_with_message("Checksums verified");

            println!("\n{}", checker.generate_summary(&report));

            if report.is_clean() {
                println!("All chunks and counters are consistent");
            } else {
                println!("Found {} integrity warnings", report.issues.len());
            }
        }

        Commands::Info { file, json, sample } => {
            let mut container = ContainerReader::with_mmap(config.use_mmap).open(&file)?;
            let records = container.records()?;
            let inventory = InventoryAnalyzer::new().analyze(&records)?;

            if json {
                println!("{}", inventory.to_json()?);
                return Ok(());
            }

            println!("Container: {}", file.display());
            println!("\n{}", inventory.detailed_summary());

            if sample > 0 {
                println!("\nSample Records (showing {} records):", sample.min(records.len()));
                for (i, record) in records.iter().take(sample).enumerate() {
                    let level = record
                        .level()
                        .map(|level| level.to_string())
                        .unwrap_or_else(|e| e.to_string());
                    println!(
                        "{}. {:<4} {:<2} {:<12} {} {}x{}x{} {} valid {}",
                        i + 1,
                        record.nomvar,
                        record.typvar,
                        record.etiket,
                        level,
                        record.ni,
                        record.nj,
                        record.nk,
                        record.grtyp,
                        record.valid_date()
                    );
                }
            }
        }

        Commands::Pressure {
            files,
            standard_atmosphere,
            output,
            max_workers,
            chunk_size,
        } => {
            let standard_atmosphere = standard_atmosphere || config.standard_atmosphere;
            let mut config = config.with_standard_atmosphere(standard_atmosphere);
            if let Some(max_workers) = max_workers {
                config.max_workers = max_workers;
            }
            if let Some(chunk_size) = chunk_size {
                config.chunk_size = chunk_size;
            }
            config.validate()?;

            println!(
                "Computing pressure for {} files (workers: {}, mode: {:?})",
                files.len(),
                config.max_workers,
                config.pressure_mode()
            );

            let progress = ProgressReporter::new(files.len() as u64, "Computing pressure...", false);
            let outcomes = MultiFileProcessor::new(config.clone())
                .process_files(files, Some(&progress))
                .await?;

            let mut writer = ContainerWriter::new().with_output_nomvar(&config.output_nomvar);
            let mut failed = 0;

            for outcome in &outcomes {
                match &outcome.result {
                    Ok(result) => {
                        println!("\n{}: {}", outcome.path.display(), result.pressure.summary());
                        for warning in &result.pressure.warnings {
                            println!("  warning: {}", warning);
                        }
                        for field in &result.pressure.fields {
                            println!(
                                "  {} {} {:>12} {:.2}..{:.2} {}",
                                field.grid,
                                field.coordinate,
                                field.level.to_string(),
                                field.min().unwrap_or(f64::NAN),
                                field.max().unwrap_or(f64::NAN),
                                field.unit.symbol()
                            );
                            if output.is_some() {
                                writer.add_pressure_field(field)?;
                            }
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        println!("\n{}: failed: {}", outcome.path.display(), e);
                    }
                }
            }

            if let Some(output) = output {
                if let Some(parent) = output.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                writer.write_to(&output)?;
                println!(
                    "\nWrote {} pressure fields to {}",
                    writer.len(),
                    output.display()
                );
            }

            if failed > 0 {
                return Err(ProcessingError::InvalidFormat(format!(
                    "{} of {} files could not be processed",
                    failed,
                    outcomes.len()
                )));
            }
        }
    }

    Ok(())
}
