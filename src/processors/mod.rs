pub mod classifier;
pub mod grouper;
pub mod integrity_checker;
pub mod multi_file_processor;
pub mod parallel_processor;
pub mod pressure_engine;

pub use classifier::{
    classify, completion, lookup, Classification, CoordinateSignature, Incomplete,
    COORDINATE_TABLE,
};
pub use grouper::{GridCoefficients, GroupKey, GroupedRecords, LevelGroup, RecordGrouper};
pub use integrity_checker::{IntegrityChecker, IntegrityIssue, IntegrityReport, IssueType};
pub use multi_file_processor::{process_file, FileOutcome, MultiFileProcessor};
pub use parallel_processor::{ContainerOutcome, ParallelProcessor};
pub use pressure_engine::{compute_pressure, PressureEngine};
