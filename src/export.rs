//! Export helpers for writing report rows to CSV.
//!
//! - `save_report_csv` writes one header row plus one row per flagged or
//!   ranked entity, in report order.
//! - `export_file_name` builds the timestamped file name used by the CLI.
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, TimeZone};
use csv::Writer;

use crate::engine::{Report, ReportKind};

pub fn export_file_name<Tz: TimeZone>(kind: ReportKind, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "entra_hygiene_{}_{}.csv",
        kind.slug(),
        at.format("%Y.%m.%d_%H.%M.%S")
    )
}

pub fn save_report_csv<P: AsRef<Path>>(report: &Report, path: P) -> Result<()> {
    let mut wtr = Writer::from_path(path)?;
    if report.rows.is_empty() {
        // serde only emits a header alongside the first record
        wtr.write_record([
            "display_name",
            "identifier",
            "object_id",
            "status",
            "days",
            "threshold",
            "severity",
            "category",
            "credential",
        ])?;
    }
    for row in &report.rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
