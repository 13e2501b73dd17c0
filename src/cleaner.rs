//! Raw sensor export cleaner.
//!
//! Turns the raw CSV exported by the field sensors into the normalized table
//! consumed by the dashboard and by the manual relational import:
//! 1. keep only recognized columns (see [`crate::schema`])
//! 2. drop rows that are entirely empty, then rows without a timestamp
//! 3. parse timestamps; one malformed timestamp aborts the run
//! 4. coerce numbers, substituting 0 for anything unparseable
//! 5. clip every value into its field's range
//! 6. truncate the flag columns to 0/1 integers
//!
//! Per-value corrections never abort; they are only counted in
//! [`CleaningStats`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim, WriterBuilder};
use tracing::{debug, info};

use crate::error::CleanError;
use crate::models::{parse_timestamp, CleaningStats, CleaningSummary, NormalizedTable, SensorReading};
use crate::schema::Field;
use crate::Config;

// ---

/// Cell contents treated as missing, in addition to blank cells.
const NA_MARKERS: [&str; 7] = ["NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// One data record of the raw export.
#[derive(Debug, Clone)]
pub struct RawRow {
    // ---
    /// 1-based line in the source file, for error reporting.
    pub line: u64,
    pub cells: Vec<String>,
}

/// Raw export exactly as read: header plus untyped cells.
#[derive(Debug, Clone)]
pub struct RawTable {
    // ---
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Read the raw export at `path`.
///
/// Rows may have fewer or more cells than the header; short rows read as
/// empty in the missing positions.
pub fn read_raw(path: impl AsRef<Path>) -> Result<RawTable, CleanError> {
    // ---
    let path = path.as_ref();
    let unavailable = |source: csv::Error| CleanError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::None)
        .from_path(path)
        .map_err(unavailable)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(unavailable)?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        let no_header = io::Error::new(io::ErrorKind::InvalidData, "no header row");
        return Err(unavailable(csv::Error::from(no_header)));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(unavailable)?;
        let line = record.position().map_or(0, |p| p.line());
        rows.push(RawRow {
            line,
            cells: record.iter().map(str::to_string).collect(),
        });
    }

    debug!("Read {} raw rows from {}", rows.len(), path.display());
    Ok(RawTable {
        path: path.to_path_buf(),
        headers,
        rows,
    })
}

fn cell(row: &RawRow, idx: usize) -> &str {
    row.cells.get(idx).map(String::as_str).unwrap_or("")
}

fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || NA_MARKERS.contains(&cell)
}

/// Coerce a numeric cell; `None` for missing or non-numeric content.
fn parse_numeric(cell: &str) -> Option<f64> {
    // ---
    if is_missing(cell) {
        return None;
    }
    cell.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Map recognized fields to their first column index, canonical order.
fn select_columns(headers: &[String]) -> Vec<(Field, usize)> {
    // ---
    let mut selected: Vec<(Field, usize)> = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        if let Some(field) = Field::from_header(header) {
            if !selected.iter().any(|(f, _)| *f == field) {
                selected.push((field, idx));
            }
        }
    }
    selected.sort_by_key(|(field, _)| *field);
    selected
}

/// Apply the cleaning rules to an in-memory raw table.
pub fn clean(raw: &RawTable) -> Result<(NormalizedTable, CleaningStats), CleanError> {
    // ---
    let selected = select_columns(&raw.headers);
    let ts_idx = selected
        .iter()
        .find(|(f, _)| *f == Field::Timestamp)
        .map(|(_, idx)| *idx)
        .ok_or_else(|| CleanError::MissingTimestampColumn {
            path: raw.path.clone(),
        })?;

    let mut stats = CleaningStats {
        raw_rows: raw.rows.len(),
        discarded_columns: raw.headers.len() - selected.len(),
        ..CleaningStats::default()
    };

    let mut readings = Vec::with_capacity(raw.rows.len());
    for row in &raw.rows {
        if selected.iter().all(|(_, idx)| is_missing(cell(row, *idx))) {
            stats.dropped_empty += 1;
            continue;
        }

        let ts_cell = cell(row, ts_idx);
        if is_missing(ts_cell) {
            stats.dropped_missing_timestamp += 1;
            continue;
        }

        let timestamp =
            parse_timestamp(ts_cell).ok_or_else(|| CleanError::UnparseableTimestamp {
                line: row.line,
                value: ts_cell.trim().to_string(),
            })?;

        let mut reading = SensorReading::at(timestamp);
        for (field, idx) in &selected {
            let Some(range) = field.range() else {
                continue;
            };

            let value = parse_numeric(cell(row, *idx)).unwrap_or_else(|| {
                stats.numeric_substitutions += 1;
                0.0
            });
            let clipped = range.clip(value);
            if clipped != value {
                stats.clipped_values += 1;
            }
            reading.set(*field, clipped);
        }
        readings.push(reading);
    }

    let table = NormalizedTable {
        columns: selected.into_iter().map(|(f, _)| f).collect(),
        readings,
    };
    Ok((table, stats))
}

/// Persist the normalized table as CSV, replacing any previous file.
///
/// The table is written next to `path` first and renamed into place, so a
/// failed write never leaves a truncated file behind.
pub fn write_normalized(table: &NormalizedTable, path: impl AsRef<Path>) -> Result<(), CleanError> {
    // ---
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| CleanError::persist(path, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "normalized.csv".into());
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let written = write_csv(table, &tmp_path).and_then(|()| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(CleanError::persist(path, e));
    }

    info!(
        "Wrote {} normalized rows to {}",
        table.readings.len(),
        path.display()
    );
    Ok(())
}

fn write_csv(table: &NormalizedTable, path: &Path) -> io::Result<()> {
    // ---
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(table.columns.iter().map(|f| f.name()))?;
    for reading in &table.readings {
        writer.write_record(table.columns.iter().map(|f| reading.cell(*f)))?;
    }
    writer.flush()
}

/// Aggregate figures reported after a run.
pub fn summarize(table: &NormalizedTable) -> CleaningSummary {
    // ---
    let readings = &table.readings;
    let mean = |field: Field| {
        let values: Vec<f64> = readings.iter().filter_map(|r| r.value(field)).collect();
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    };

    CleaningSummary {
        record_count: readings.len(),
        first_timestamp: readings.iter().map(|r| r.timestamp).min(),
        last_timestamp: readings.iter().map(|r| r.timestamp).max(),
        mean_moisture: mean(Field::UmidadeSolo),
        mean_ph: mean(Field::PhSolo),
        irrigation_count: readings.iter().filter(|r| r.is_irrigating()).count(),
    }
}

/// Run the full cleaning pipeline configured by `cfg`.
///
/// Nothing is written unless every step before persistence succeeds.
#[tracing::instrument(skip_all, fields(raw = %cfg.raw_csv.display()))]
pub fn run(cfg: &Config) -> Result<CleaningSummary, CleanError> {
    // ---
    info!("Cleaning raw sensor data");

    let raw = read_raw(&cfg.raw_csv)?;
    let (table, stats) = clean(&raw)?;

    debug!(
        raw_rows = stats.raw_rows,
        dropped_empty = stats.dropped_empty,
        dropped_missing_timestamp = stats.dropped_missing_timestamp,
        numeric_substitutions = stats.numeric_substitutions,
        clipped_values = stats.clipped_values,
        discarded_columns = stats.discarded_columns,
        "Cleaning corrections"
    );

    write_normalized(&table, &cfg.clean_csv)?;
    Ok(summarize(&table))
}
