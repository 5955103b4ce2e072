//! Report builder: turns a finished run into a table and exports it.
//!
//! Delimited layout:
//!
//! ```text
//! Migration Report
//! Total Items: 3
//! Total Time: 00:00:04
//!
//! Item,Records,Result,Migrated,Failed,Time,Error
//! users,3,Partial,2,1,00:00:01.204,
//! ```

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::result::{Classification, JobResult, MigrationRun};
use crate::error::Result;

/// Column header of the per-item table.
pub const COLUMNS: [&str; 7] = ["Item", "Records", "Result", "Migrated", "Failed", "Time", "Error"];

/// One row of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub item: String,
    pub records: u64,
    pub result: Classification,
    pub migrated: u64,
    pub failed: u64,
    pub time: String,
    pub error: String,
}

impl From<&JobResult> for ReportRow {
    fn from(r: &JobResult) -> Self {
        Self {
            item: r.item_name.clone(),
            records: r.source_record_count,
            result: r.classification,
            migrated: r.migrated_count,
            failed: r.failed_count,
            time: format_hms_millis(r.elapsed),
            error: r.error_message.clone().unwrap_or_default(),
        }
    }
}

impl ReportRow {
    fn record(&self) -> [String; 7] {
        [
            self.item.clone(),
            self.records.to_string(),
            self.result.to_string(),
            self.migrated.to_string(),
            self.failed.to_string(),
            self.time.clone(),
            self.error.clone(),
        ]
    }
}

/// Tabular summary of a migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub total_items: usize,
    pub total_time: String,
    pub rows: Vec<ReportRow>,
}

impl MigrationReport {
    pub fn from_run(run: &MigrationRun) -> Self {
        Self {
            total_items: run.total_items,
            total_time: format_hms(run.total_elapsed),
            rows: run.results.iter().map(ReportRow::from).collect(),
        }
    }

    /// Write the header block and the per-item table.
    pub fn write_csv<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "Migration Report")?;
        writeln!(out, "Total Items: {}", self.total_items)?;
        writeln!(out, "Total Time: {}", self.total_time)?;
        writeln!(out)?;

        let mut wtr = csv::Writer::from_writer(&mut out);
        wtr.write_record(COLUMNS)?;
        for row in &self.rows {
            wtr.write_record(row.record())?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Export to a file.
    pub fn save_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        self.write_csv(&mut out)?;
        out.flush()?;
        info!("Report exported to {}", path.display());
        Ok(())
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows
            .iter()
            .map(|r| r.item.len())
            .chain(std::iter::once(COLUMNS[0].len()))
            .max()
            .unwrap_or(4);

        writeln!(f, "Total Items: {}  Total Time: {}", self.total_items, self.total_time)?;
        writeln!(
            f,
            "{:<width$}  {:>8}  {:<7}  {:>8}  {:>6}  {:<12}  {}",
            COLUMNS[0], COLUMNS[1], COLUMNS[2], COLUMNS[3], COLUMNS[4], COLUMNS[5], COLUMNS[6],
            width = width
        )?;
        for r in &self.rows {
            writeln!(
                f,
                "{:<width$}  {:>8}  {:<7}  {:>8}  {:>6}  {:<12}  {}",
                r.item,
                r.records,
                r.result.as_str(),
                r.migrated,
                r.failed,
                r.time,
                r.error,
                width = width
            )?;
        }
        Ok(())
    }
}

/// `HH:MM:SS`, hours not wrapped at 24.
pub fn format_hms(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// `HH:MM:SS.mmm`.
pub fn format_hms_millis(d: Duration) -> String {
    format!("{}.{:03}", format_hms(d), d.subsec_millis())
}
