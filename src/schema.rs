//! Recognized column schema for `farmtech-sensorflow`.
//!
//! Single source of truth for which raw CSV columns survive cleaning, what
//! kind of value each one carries, and the physically valid range every
//! numeric value is clipped into. The cleaner and the dashboard both go
//! through this table (EMBP: nothing else hardcodes column names).

use std::fmt;

use serde::Serialize;

// ---

/// Kind of value a recognized column carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Mandatory instant, parsed and re-emitted in canonical form.
    Timestamp,
    /// Real-valued measurement.
    Float,
    /// 0/1 indicator, clipped then truncated to an integer.
    Flag,
}

/// Closed range a numeric value is clipped into.
///
/// An absent `max` means the range is unbounded above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    // ---
    pub min: f64,
    pub max: Option<f64>,
}

impl ValueRange {
    // ---
    const fn bounded(min: f64, max: f64) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    const fn at_least(min: f64) -> Self {
        Self { min, max: None }
    }

    /// Bound `value` into the range; values already inside are untouched.
    ///
    /// Negative zero comes back as `0.0`.
    pub fn clip(&self, value: f64) -> f64 {
        // ---
        let lower = value.max(self.min);
        let clipped = match self.max {
            Some(max) => lower.min(max),
            None => lower,
        };
        clipped + 0.0
    }

    /// Whether `value` already lies inside the range.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && self.max.map_or(true, |max| value <= max)
    }
}

/// One recognized column of the sensor export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Timestamp,
    UmidadeSolo,
    PhSolo,
    Nitrogenio,
    Fosforo,
    Potassio,
    Temperatura,
    ChuvaMm,
    IrrigacaoAtiva,
}

impl Field {
    /// Every recognized column, in canonical output order.
    pub const ALL: [Field; 9] = [
        Field::Timestamp,
        Field::UmidadeSolo,
        Field::PhSolo,
        Field::Nitrogenio,
        Field::Fosforo,
        Field::Potassio,
        Field::Temperatura,
        Field::ChuvaMm,
        Field::IrrigacaoAtiva,
    ];

    /// Column name as it appears in the CSV header.
    pub const fn name(self) -> &'static str {
        // ---
        match self {
            Field::Timestamp => "timestamp",
            Field::UmidadeSolo => "umidade_solo",
            Field::PhSolo => "ph_solo",
            Field::Nitrogenio => "nitrogenio",
            Field::Fosforo => "fosforo",
            Field::Potassio => "potassio",
            Field::Temperatura => "temperatura",
            Field::ChuvaMm => "chuva_mm",
            Field::IrrigacaoAtiva => "irrigacao_ativa",
        }
    }

    pub const fn kind(self) -> FieldKind {
        // ---
        match self {
            Field::Timestamp => FieldKind::Timestamp,
            Field::UmidadeSolo | Field::PhSolo | Field::Temperatura | Field::ChuvaMm => {
                FieldKind::Float
            }
            Field::Nitrogenio | Field::Fosforo | Field::Potassio | Field::IrrigacaoAtiva => {
                FieldKind::Flag
            }
        }
    }

    /// Valid range for numeric columns; `None` for the timestamp.
    pub const fn range(self) -> Option<ValueRange> {
        // ---
        match self {
            Field::Timestamp => None,
            Field::UmidadeSolo => Some(ValueRange::bounded(0.0, 100.0)),
            Field::PhSolo => Some(ValueRange::bounded(0.0, 14.0)),
            Field::Nitrogenio | Field::Fosforo | Field::Potassio | Field::IrrigacaoAtiva => {
                Some(ValueRange::bounded(0.0, 1.0))
            }
            Field::Temperatura => Some(ValueRange::bounded(-50.0, 60.0)),
            Field::ChuvaMm => Some(ValueRange::at_least(0.0)),
        }
    }

    /// Resolve a raw header cell; unknown columns yield `None`.
    pub fn from_header(header: &str) -> Option<Field> {
        let header = header.trim();
        Field::ALL.into_iter().find(|f| f.name() == header)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
