//! Per-job outcomes and the aggregated run.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome tag derived from row counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "OK")]
    Ok,
    Partial,
    Fail,
}

impl Classification {
    /// Derive the tag from the counts of a job that ran to completion
    /// (or was cancelled between rows).
    ///
    /// * every source row migrated, none failed: `Ok` (an empty item is `Ok`)
    /// * nothing migrated out of a non-empty item: `Fail`
    /// * anything else: `Partial`
    pub fn from_counts(source_count: u64, migrated: u64, failed: u64) -> Self {
        if failed == 0 && migrated >= source_count {
            Classification::Ok
        } else if migrated == 0 && source_count > 0 {
            Classification::Fail
        } else {
            Classification::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Ok => "OK",
            Classification::Partial => "Partial",
            Classification::Fail => "Fail",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single item migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Display name of the item.
    pub item_name: String,

    /// Rows in the source item.
    pub source_record_count: u64,

    /// Rows inserted into the target.
    pub migrated_count: u64,

    /// Rows that failed normalization or insert.
    pub failed_count: u64,

    /// Wall-clock time of the job.
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,

    pub classification: Classification,

    /// Job-level error text, when the job aborted.
    pub error_message: Option<String>,

    /// True when the stop signal ended the job early.
    #[serde(default)]
    pub cancelled: bool,
}

impl JobResult {
    /// Result of a job that moved rows (possibly cancelled midway).
    pub fn completed(
        item_name: impl Into<String>,
        source_record_count: u64,
        migrated_count: u64,
        failed_count: u64,
        elapsed: Duration,
        cancelled: bool,
    ) -> Self {
        Self {
            item_name: item_name.into(),
            source_record_count,
            migrated_count,
            failed_count,
            elapsed,
            classification: Classification::from_counts(
                source_record_count,
                migrated_count,
                failed_count,
            ),
            error_message: None,
            cancelled,
        }
    }

    /// Result of a job aborted by a job-level error before any row was
    /// accounted for. Every known source row counts as failed.
    pub fn failed(
        item_name: impl Into<String>,
        source_record_count: u64,
        elapsed: Duration,
        error: impl ToString,
    ) -> Self {
        Self::aborted(item_name, source_record_count, 0, elapsed, error)
    }

    /// Result of a job aborted by a job-level error after `migrated_count`
    /// rows were already committed. Those stay counted; every other source
    /// row counts as failed. The job is `Fail` whatever the counts.
    pub fn aborted(
        item_name: impl Into<String>,
        source_record_count: u64,
        migrated_count: u64,
        elapsed: Duration,
        error: impl ToString,
    ) -> Self {
        Self {
            item_name: item_name.into(),
            source_record_count,
            migrated_count,
            failed_count: source_record_count.saturating_sub(migrated_count),
            elapsed,
            classification: Classification::Fail,
            error_message: Some(error.to_string()),
            cancelled: false,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.classification == Classification::Ok
    }
}

/// Ordered results of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationRun {
    pub results: Vec<JobResult>,
    pub total_items: usize,

    #[serde(with = "duration_secs")]
    pub total_elapsed: Duration,

    #[serde(default)]
    pub cancelled: bool,
}

impl MigrationRun {
    pub fn new(total_items: usize) -> Self {
        Self {
            results: Vec::with_capacity(total_items),
            total_items,
            ..Default::default()
        }
    }

    pub fn push(&mut self, result: JobResult) {
        self.results.push(result);
    }

    /// Count of results carrying the given classification.
    pub fn count(&self, classification: Classification) -> usize {
        self.results
            .iter()
            .filter(|r| r.classification == classification)
            .count()
    }

    pub fn migrated_total(&self) -> u64 {
        self.results.iter().map(|r| r.migrated_count).sum()
    }

    pub fn failed_total(&self) -> u64 {
        self.results.iter().map(|r| r.failed_count).sum()
    }

    /// True when every item finished OK.
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(JobResult::is_ok)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aborted_keeps_committed_rows() {
        let r = JobResult::aborted("people", 10, 3, Duration::from_millis(5), "connection reset");
        assert_eq!(r.migrated_count, 3);
        assert_eq!(r.failed_count, 7);
        assert_eq!(r.classification, Classification::Fail);
        assert_eq!(r.error_message.as_deref(), Some("connection reset"));

        let r = JobResult::failed("people", 4, Duration::ZERO, "no such table");
        assert_eq!((r.migrated_count, r.failed_count), (0, 4));
    }

    #[test]
    fn test_classification_from_counts() {
        assert_eq!(Classification::from_counts(10, 10, 0), Classification::Ok);
        assert_eq!(Classification::from_counts(10, 7, 3), Classification::Partial);
        assert_eq!(Classification::from_counts(10, 0, 10), Classification::Fail);
        assert_eq!(Classification::from_counts(0, 0, 0), Classification::Ok);
    }

    #[test]
    fn test_cancelled_counts_are_partial() {
        // 40 of 100 rows moved before the stop signal.
        assert_eq!(Classification::from_counts(100, 40, 0), Classification::Partial);
        assert_eq!(Classification::from_counts(100, 0, 0), Classification::Fail);
    }

    #[test]
    fn test_failed_result() {
        let r = JobResult::failed("orders", 12, Duration::from_millis(5), "connection reset");
        assert_eq!(r.classification, Classification::Fail);
        assert_eq!(r.migrated_count, 0);
        assert_eq!(r.failed_count, 12);
        assert_eq!(r.error_message.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_run_totals() {
        let mut run = MigrationRun::new(2);
        run.push(JobResult::completed("a", 3, 3, 0, Duration::ZERO, false));
        run.push(JobResult::completed("b", 3, 2, 1, Duration::ZERO, false));
        assert_eq!(run.migrated_total(), 5);
        assert_eq!(run.failed_total(), 1);
        assert_eq!(run.count(Classification::Partial), 1);
        assert!(!run.all_ok());
    }

    #[test]
    fn test_classification_serializes_as_label() {
        let json = serde_json::to_string(&Classification::Ok).unwrap();
        assert_eq!(json, "\"OK\"");
    }
}
