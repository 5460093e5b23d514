use crate::error::Result;
use crate::readers::{Container, FieldKey};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub chunks: usize,
    pub live_records: usize,
    pub deleted_records: usize,
    pub declared_chunks: u32,
    pub declared_records: u32,
    pub declared_erased: u32,
    pub declared_size_bytes: u64,
    pub actual_size_bytes: u64,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, issue_type: IssueType) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.issue_type == issue_type)
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityIssue {
    pub offset: u64,
    pub issue_type: IssueType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueType {
    CounterMismatch,
    PayloadBeyondDeclaredSize,
    DuplicateKey,
    UndecodableLevel,
}

/// Cross-checks a verified walk against what the file header declares.
///
/// Checksum and structure failures are errors of the walk itself; everything
/// reported here is a warning.
pub struct IntegrityChecker {
    max_listed_issues: usize,
}

impl IntegrityChecker {
    pub fn new() -> Self {
        Self {
            max_listed_issues: 10,
        }
    }

    pub fn with_max_listed_issues(max_listed_issues: usize) -> Self {
        Self { max_listed_issues }
    }

    /// Walk every chunk of `container` and collect the findings.
    pub fn check_container(&self, container: &mut Container) -> Result<IntegrityReport> {
        let records = container.records()?;
        let stats = container.stats();
        let header = container.header().clone();

        let mut report = IntegrityReport {
            chunks: stats.chunks,
            live_records: stats.live_records,
            deleted_records: stats.deleted_records,
            declared_chunks: header.chunk_count,
            declared_records: header.record_count,
            declared_erased: header.erased_count,
            declared_size_bytes: header.file_size_bytes(),
            actual_size_bytes: container.len() as u64,
            issues: Vec::new(),
        };

        self.check_counters(&mut report);

        let mut seen: HashMap<FieldKey, u64> = HashMap::new();
        for record in &records {
            if let Some(start) = record.data_offset() {
                let end = start + record.payload_bytes();
                if end > report.declared_size_bytes {
                    report.issues.push(IntegrityIssue {
                        offset: record.offset,
                        issue_type: IssueType::PayloadBeyondDeclaredSize,
                        details: format!(
                            "{} payload ends at byte {}, header declares {}",
                            record.nomvar, end, report.declared_size_bytes
                        ),
                    });
                }
            }

            if let Err(e) = record.level() {
                report.issues.push(IntegrityIssue {
                    offset: record.offset,
                    issue_type: IssueType::UndecodableLevel,
                    details: format!("{} ip1 {}: {}", record.nomvar, record.ip1, e),
                });
            }

            if let Some(first) = seen.insert(FieldKey::of(record), record.offset) {
                report.issues.push(IntegrityIssue {
                    offset: record.offset,
                    issue_type: IssueType::DuplicateKey,
                    details: format!(
                        "{} ip1 {} repeats the entry at byte {}",
                        record.nomvar, record.ip1, first
                    ),
                });
            }
        }

        Ok(report)
    }

    fn check_counters(&self, report: &mut IntegrityReport) {
        let counters = [
            ("chunk", report.declared_chunks as usize, report.chunks),
            ("record", report.declared_records as usize, report.live_records),
            ("erased", report.declared_erased as usize, report.deleted_records),
        ];

        for (name, declared, observed) in counters {
            if declared != observed {
                report.issues.push(IntegrityIssue {
                    offset: 0,
                    issue_type: IssueType::CounterMismatch,
                    details: format!(
                        "header declares {} {} entries, walk found {}",
                        declared, name, observed
                    ),
                });
            }
        }
    }

    /// Generate a summary report
    pub fn generate_summary(&self, report: &IntegrityReport) -> String {
        let mut summary = String::new();

        summary.push_str("=== Integrity Check Report ===\n");
        summary.push_str(&format!(
            "Chunks: {} (header: {})\n",
            report.chunks, report.declared_chunks
        ));
        summary.push_str(&format!(
            "Live Records: {} (header: {})\n",
            report.live_records, report.declared_records
        ));
        summary.push_str(&format!(
            "Deleted Records: {} (header: {})\n",
            report.deleted_records, report.declared_erased
        ));
        summary.push_str(&format!(
            "File Size: {} bytes (header: {})\n",
            report.actual_size_bytes, report.declared_size_bytes
        ));
        summary.push_str(&format!("\nIssues: {}\n", report.issues.len()));

        if !report.issues.is_empty() {
            summary.push_str(&format!("\nFirst {} Issues:\n", self.max_listed_issues));
            for (i, issue) in report
                .issues
                .iter()
                .take(self.max_listed_issues)
                .enumerate()
            {
                summary.push_str(&format!(
                    "  {}. {:?} at byte {}: {}\n",
                    i + 1,
                    issue.issue_type,
                    issue.offset,
                    issue.details
                ));
            }
        }

        summary
    }
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::new()
    }
}
