//! Human-readable report rendering for terminal output.
//!
//! Produces a colored report: a title line, one section listing the flagged
//! or ranked entities, and a summary section with totals and the per-category
//! breakdown. A run that flags nothing still renders its summary with an
//! explicit "0 found" line.
use colored::*;

use crate::classify::Status;
use crate::engine::{Report, ReportKind, ReportRow};

fn visible_len(s: &str) -> usize {
    // Strip ANSI escape sequences (\x1b[ ... m) to compute printable width
    let mut len = 0;
    let mut iter = s.chars().peekable();
    while let Some(ch) = iter.next() {
        if ch == '\u{1b}' {
            if let Some('[') = iter.peek().cloned() {
                let _ = iter.next();
            }
            for c in iter.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            len += 1;
        }
    }
    len
}

fn section_header(title: &str) -> String {
    let len = visible_len(title);
    let mut s = String::new();
    s.push('\n');
    s.push_str(title);
    s.push('\n');
    s.push_str(&"─".repeat(len));
    s.push_str("\n\n");
    s
}

fn plural(n: i64, one: &str, many: &str) -> String {
    if n.abs() == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn group_line(row: &ReportRow) -> String {
    format!(
        "  {} ({}) - {} [{}]",
        row.display_name.bold(),
        row.identifier,
        "0 members".red(),
        row.category
    )
}

fn inactive_line(row: &ReportRow) -> String {
    let last_seen = match (row.status, row.days) {
        (Status::Inactive, Some(days)) => {
            format!("last sign-in {} ago", plural(days, "day", "days"))
        }
        (status, _) => status.label().to_string(),
    };
    let threshold = row
        .threshold
        .map(|t| format!(" (threshold {t} days)"))
        .unwrap_or_default();
    let last_seen = match row.severity {
        Some(sev) => sev.paint(&last_seen).to_string(),
        None => last_seen,
    };
    format!(
        "  {} ({}) - {}{}",
        row.display_name.bold(),
        row.identifier,
        last_seen,
        threshold.dimmed()
    )
}

fn expiry_line(row: &ReportRow) -> String {
    let when = match row.days {
        Some(d) if d < 0 => format!("expired {} ago", plural(-d, "day", "days")),
        Some(0) => "expires today".to_string(),
        Some(d) => format!("expires in {}", plural(d, "day", "days")),
        None => "N/A".to_string(),
    };
    let (when, band) = match row.severity {
        Some(sev) => (
            sev.paint(&when).to_string(),
            sev.paint(&format!("[{sev}]")).to_string(),
        ),
        None => (when, String::new()),
    };
    let credential = row
        .credential
        .as_deref()
        .map(|c| format!(" {}", c.dimmed()))
        .unwrap_or_default();
    format!(
        "  {} ({}) - {} {}{}",
        row.display_name.bold(),
        row.identifier,
        when,
        band,
        credential
    )
}

fn row_line(kind: ReportKind, row: &ReportRow) -> String {
    match kind {
        ReportKind::EmptyGroups => group_line(row),
        ReportKind::InactiveUsers | ReportKind::InactiveApps => inactive_line(row),
        ReportKind::ExpiringCredentials => expiry_line(row),
    }
}

pub fn render_report(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n",
        format!("Entra ID Hygiene: {}", report.kind.title())
            .bold()
            .cyan()
    ));
    out.push_str(&format!("As of {}\n", report.as_of.format("%Y-%m-%d")));

    // Findings, grouped under a sub-heading per category for inactivity reports
    let mut lines: Vec<String> = Vec::new();
    if report.rows.is_empty() {
        lines.push(format!("(No {} found)", report.kind.noun()));
    } else {
        let grouped = matches!(
            report.kind,
            ReportKind::InactiveUsers | ReportKind::InactiveApps
        ) && report.summary.by_category.len() > 1;
        let mut current: Option<&str> = None;
        for row in &report.rows {
            if grouped && current != Some(row.category.as_str()) {
                current = Some(row.category.as_str());
                lines.push(row.category.bold().blue().to_string());
            }
            lines.push(row_line(report.kind, row));
        }
        if report.kind == ReportKind::ExpiringCredentials
            && report.rows.len() < report.summary.total_flagged
        {
            lines.push(
                format!(
                    "  ... showing {} of {}",
                    report.rows.len(),
                    report.summary.total_flagged
                )
                .dimmed()
                .to_string(),
            );
        }
    }
    out.push_str(&section_header(
        &report.kind.title().bold().yellow().to_string(),
    ));
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }

    // Summary
    let s = &report.summary;
    let mut summary_lines: Vec<String> = Vec::new();
    summary_lines.push(format!("Checked: {}", s.total_checked));
    if report.is_clean() {
        summary_lines.push(format!("{} {} found", "0".green().bold(), report.kind.noun()));
    } else {
        summary_lines.push(format!(
            "Found: {} {}",
            s.total_flagged.to_string().red().bold(),
            report.kind.noun()
        ));
        for (category, count) in &s.by_category {
            summary_lines.push(format!("  {category}: {count}"));
        }
    }
    out.push_str(&section_header(&"Summary".bold().magenta().to_string()));
    for line in summary_lines {
        out.push_str(&line);
        out.push('\n');
    }

    out
}
