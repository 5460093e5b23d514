use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stdfile-processor")]
#[command(about = "Standard file reader and pressure reconstruction")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "warn", help = "Log level")]
    pub log_level: String,

    #[arg(
        short,
        long,
        global = true,
        help = "Configuration file (TOML, YAML or JSON)"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Walk and verify every directory chunk
    Inspect {
        file: PathBuf,

        #[arg(long, help = "Memory-map the file instead of reading it")]
        mmap: bool,
    },

    /// Summarise the records of a container
    Info {
        file: PathBuf,

        #[arg(long, help = "Print the inventory as JSON")]
        json: bool,

        #[arg(short, long, default_value = "0")]
        sample: usize,
    },

    /// Compute pressure on every classified level
    Pressure {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, help = "Use a constant 1013.25 hPa surface pressure")]
        standard_atmosphere: bool,

        #[arg(short, long, help = "Write the pressure fields to a new container")]
        output: Option<PathBuf>,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long)]
        chunk_size: Option<usize>,
    },
}
