//! Report rendering.

use clap::ValueEnum;
use revdiff_engine::ComparisonReport;
use revdiff_protocol::{DocumentId, RevisionId};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

/// Output format of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable sections
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Writes `report` to `out` in the given format.
pub fn write<W: Write>(out: &mut W, report: &ComparisonReport, format: Format) -> io::Result<()> {
    match format {
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)
        }
        Format::Text => write_text(out, report),
    }
}

fn write_text<W: Write>(out: &mut W, report: &ComparisonReport) -> io::Result<()> {
    write_ids(out, "Only in A", &report.only_in_a)?;
    write_ids(out, "Only in B", &report.only_in_b)?;
    write_missing(out, "Missing in A", &report.missing_in_a)?;
    write_missing(out, "Missing in B", &report.missing_in_b)?;

    if !report.unresolved.is_empty() {
        writeln!(out, "Unresolved ({}):", report.unresolved.len())?;
        for unresolved in &report.unresolved {
            writeln!(
                out,
                "  {} {}: {}",
                unresolved.direction, unresolved.document.id, unresolved.document.reason
            )?;
        }
    }

    if !report.failures.is_empty() {
        writeln!(out, "Failed batches ({}):", report.failures.len())?;
        for failure in &report.failures {
            writeln!(
                out,
                "  {} batch {} ({} documents): {}",
                failure.direction,
                failure.failure.index,
                failure.failure.documents.len(),
                failure.failure.error
            )?;
        }
    }

    Ok(())
}

fn write_ids<W: Write>(out: &mut W, title: &str, ids: &BTreeSet<DocumentId>) -> io::Result<()> {
    writeln!(out, "{} ({}):", title, ids.len())?;
    for id in ids {
        writeln!(out, "  {}", id)?;
    }
    Ok(())
}

fn write_missing<W: Write>(
    out: &mut W,
    title: &str,
    missing: &BTreeMap<DocumentId, Vec<RevisionId>>,
) -> io::Result<()> {
    writeln!(out, "{} ({}):", title, missing.len())?;
    for (id, revs) in missing {
        let revs: Vec<&str> = revs.iter().map(RevisionId::as_str).collect();
        writeln!(out, "  {}: {}", id, revs.join(", "))?;
    }
    Ok(())
}
