use std::io::Write;

use serde::Deserialize;

use crate::error::Result;
use crate::fields::FieldSpec;
use crate::normalize::{cell_text, flatten_for_table, project};
use crate::record::ResolutionRecord;

/// Report serialization formats.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON array holding every record
    Json,
    /// One JSON object per line
    #[default]
    Jsonl,
    /// Comma separated values with a header row
    Csv,
}

/// Write `records` to `out` in `format`, keeping only the fields in `fields`.
pub fn write_report<W: Write>(
    out: W,
    records: &[ResolutionRecord],
    fields: &FieldSpec,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Csv => write_csv(out, records, fields),
        OutputFormat::Json => write_json(out, records, fields, false),
        OutputFormat::Jsonl => write_json(out, records, fields, true),
    }
}

/// CSV with one column per field. Nested values are flattened first, so the
/// header can grow `field.subkey` columns; keys outside the header are
/// ignored. Fields are quoted only when needed and lines end with CRLF.
pub fn write_csv<W: Write>(out: W, records: &[ResolutionRecord], fields: &FieldSpec) -> Result<()> {
    let mut columns = fields.clone();
    let rows = flatten_for_table(records, &mut columns);

    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(out);
    wtr.write_record(columns.iter())?;
    for row in &rows {
        wtr.write_record(
            columns
                .iter()
                .map(|c| row.get(c).map(cell_text).unwrap_or_default()),
        )?;
    }
    wtr.flush()?;
    Ok(())
}

/// JSON array, or JSON lines when `lines` is set. Every object carries
/// exactly the keys in `fields`.
pub fn write_json<W: Write>(
    mut out: W,
    records: &[ResolutionRecord],
    fields: &FieldSpec,
    lines: bool,
) -> Result<()> {
    let rows = project(records.to_vec(), fields);
    if lines {
        for row in &rows {
            serde_json::to_writer(&mut out, row)?;
            out.write_all(b"\n")?;
        }
    } else {
        serde_json::to_writer(&mut out, &rows)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
