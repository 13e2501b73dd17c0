//! Data models for the soil sensor pipeline.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::schema::{Field, FieldKind};

// ---

/// Canonical textual form of a timestamp in the normalized CSV.
///
/// Sub-second precision is kept; `%.f` prints nothing for whole seconds.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Naive layouts accepted in addition to RFC 3339, tried in order.
const NAIVE_LAYOUTS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse a raw timestamp cell into the canonical representation.
///
/// Offset-carrying RFC 3339 instants are converted to UTC; naive layouts are
/// taken as-is. A bare date means midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    // ---
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// One cleaned, timestamped observation.
///
/// `None` means the column was absent from the source, never a bad value:
/// unparseable numbers have already been replaced by 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    // ---
    pub timestamp: NaiveDateTime,
    pub umidade_solo: Option<f64>,
    pub ph_solo: Option<f64>,
    pub nitrogenio: Option<u8>,
    pub fosforo: Option<u8>,
    pub potassio: Option<u8>,
    pub temperatura: Option<f64>,
    pub chuva_mm: Option<f64>,
    pub irrigacao_ativa: Option<u8>,
}

impl SensorReading {
    /// Reading with only a timestamp; every measurement absent.
    pub fn at(timestamp: NaiveDateTime) -> Self {
        // ---
        Self {
            timestamp,
            umidade_solo: None,
            ph_solo: None,
            nitrogenio: None,
            fosforo: None,
            potassio: None,
            temperatura: None,
            chuva_mm: None,
            irrigacao_ativa: None,
        }
    }

    /// Numeric value of a measurement column, flags widened to `f64`.
    pub fn value(&self, field: Field) -> Option<f64> {
        // ---
        match field {
            Field::Timestamp => None,
            Field::UmidadeSolo => self.umidade_solo,
            Field::PhSolo => self.ph_solo,
            Field::Nitrogenio => self.nitrogenio.map(f64::from),
            Field::Fosforo => self.fosforo.map(f64::from),
            Field::Potassio => self.potassio.map(f64::from),
            Field::Temperatura => self.temperatura,
            Field::ChuvaMm => self.chuva_mm,
            Field::IrrigacaoAtiva => self.irrigacao_ativa.map(f64::from),
        }
    }

    /// Store an already clipped measurement; flags are truncated here.
    pub(crate) fn set(&mut self, field: Field, value: f64) {
        // ---
        let flag = || value.trunc() as u8;
        match field {
            Field::Timestamp => {}
            Field::UmidadeSolo => self.umidade_solo = Some(value),
            Field::PhSolo => self.ph_solo = Some(value),
            Field::Nitrogenio => self.nitrogenio = Some(flag()),
            Field::Fosforo => self.fosforo = Some(flag()),
            Field::Potassio => self.potassio = Some(flag()),
            Field::Temperatura => self.temperatura = Some(value),
            Field::ChuvaMm => self.chuva_mm = Some(value),
            Field::IrrigacaoAtiva => self.irrigacao_ativa = Some(flag()),
        }
    }

    /// Text of one column as written to the normalized CSV.
    pub fn cell(&self, field: Field) -> String {
        // ---
        match field.kind() {
            FieldKind::Timestamp => self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            FieldKind::Flag => self
                .value(field)
                .map(|v| (v as u8).to_string())
                .unwrap_or_default(),
            FieldKind::Float => self.value(field).map(|v| v.to_string()).unwrap_or_default(),
        }
    }

    pub fn is_irrigating(&self) -> bool {
        self.irrigacao_ativa == Some(1)
    }
}

/// Cleaned, schema-restricted, range-valid table.
///
/// Owned by the caller for the duration of one run or one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTable {
    // ---
    /// Recognized columns present in the source, in canonical order.
    pub columns: Vec<Field>,
    pub readings: Vec<SensorReading>,
}

/// Aggregate count of the non-fatal corrections made during cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningStats {
    // ---
    pub raw_rows: usize,
    pub dropped_empty: usize,
    pub dropped_missing_timestamp: usize,
    pub numeric_substitutions: usize,
    pub clipped_values: usize,
    pub discarded_columns: usize,
}

/// Human-readable outcome of a cleaning run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningSummary {
    // ---
    pub record_count: usize,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
    pub mean_moisture: Option<f64>,
    pub mean_ph: Option<f64>,
    pub irrigation_count: usize,
}

impl CleaningSummary {
    /// Share of irrigation-active rows as a percentage.
    pub fn irrigation_percentage(&self) -> Option<f64> {
        (self.record_count > 0)
            .then(|| self.irrigation_count as f64 / self.record_count as f64 * 100.0)
    }
}

impl fmt::Display for CleaningSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let ts = |t: Option<NaiveDateTime>| {
            t.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_else(|| "n/a".into())
        };
        let one_decimal = |v: Option<f64>, unit: &str| {
            v.map(|v| format!("{v:.1}{unit}"))
                .unwrap_or_else(|| "n/a".into())
        };

        writeln!(f, "Total records : {}", self.record_count)?;
        writeln!(
            f,
            "Period        : {} to {}",
            ts(self.first_timestamp),
            ts(self.last_timestamp)
        )?;
        writeln!(f, "Mean moisture : {}", one_decimal(self.mean_moisture, "%"))?;
        writeln!(f, "Mean pH       : {}", one_decimal(self.mean_ph, ""))?;
        write!(f, "Irrigations   : {}", self.irrigation_count)
    }
}
