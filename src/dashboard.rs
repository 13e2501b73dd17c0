//! Data layer behind the farm dashboard.
//!
//! Loads the normalized table written by the cleaner and derives everything
//! the dashboard shows: headline metrics, the grouped series behind its
//! charts, and rule-based suggestions for the most recent reading. Rendering
//! is left to whoever consumes the JSON or the plain-text report.
//!
//! The table is loaded per call and owned by the caller; nothing is cached.
//! When the normalized file is missing, unreadable, or empty, a built-in
//! sample table is served instead so consumers never see an empty dashboard.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::ops::RangeInclusive;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{parse_timestamp, SensorReading, TIMESTAMP_FORMAT};
use crate::schema::Field;

// ---

/// Soil moisture (%) below which irrigation is recommended.
pub const IRRIGATION_MOISTURE_THRESHOLD: f64 = 60.0;

/// Soil pH band considered ideal for soybean.
pub const IDEAL_PH: RangeInclusive<f64> = 6.0..=6.8;

/// Where the dashboard's table came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    /// Normalized CSV produced by the cleaner.
    File { path: String },
    /// Built-in sample table; `reason` says why the file was not used.
    Fallback { reason: String },
}

/// Table loaded for one dashboard request.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    // ---
    pub source: DataSource,
    pub readings: Vec<SensorReading>,
}

/// One row of the normalized CSV; absent columns deserialize as `None`.
#[derive(Debug, Deserialize)]
struct NormalizedRow {
    // ---
    timestamp: String,
    #[serde(default)]
    umidade_solo: Option<f64>,
    #[serde(default)]
    ph_solo: Option<f64>,
    #[serde(default)]
    nitrogenio: Option<f64>,
    #[serde(default)]
    fosforo: Option<f64>,
    #[serde(default)]
    potassio: Option<f64>,
    #[serde(default)]
    temperatura: Option<f64>,
    #[serde(default)]
    chuva_mm: Option<f64>,
    #[serde(default)]
    irrigacao_ativa: Option<f64>,
}

impl NormalizedRow {
    fn into_reading(self) -> Result<SensorReading> {
        // ---
        let timestamp = parse_timestamp(&self.timestamp)
            .ok_or_else(|| anyhow!("unparseable timestamp {:?}", self.timestamp))?;

        let mut reading = SensorReading::at(timestamp);
        let values = [
            (Field::UmidadeSolo, self.umidade_solo),
            (Field::PhSolo, self.ph_solo),
            (Field::Nitrogenio, self.nitrogenio),
            (Field::Fosforo, self.fosforo),
            (Field::Potassio, self.potassio),
            (Field::Temperatura, self.temperatura),
            (Field::ChuvaMm, self.chuva_mm),
            (Field::IrrigacaoAtiva, self.irrigacao_ativa),
        ];
        for (field, value) in values {
            if let (Some(value), Some(range)) = (value, field.range()) {
                reading.set(field, range.clip(value));
            }
        }
        Ok(reading)
    }
}

/// Read the normalized CSV strictly; any problem is an error.
pub fn read_normalized(path: impl AsRef<Path>) -> Result<Vec<SensorReading>> {
    // ---
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let mut readings = Vec::new();
    for (i, row) in reader.deserialize::<NormalizedRow>().enumerate() {
        let row = row.with_context(|| format!("bad record {} in {}", i + 1, path.display()))?;
        readings.push(row.into_reading()?);
    }
    Ok(readings)
}

/// Load the dashboard table, falling back to the built-in sample.
pub fn load_table(path: impl AsRef<Path>) -> LoadedTable {
    // ---
    let path = path.as_ref();
    let reason = match read_normalized(path) {
        Ok(readings) if !readings.is_empty() => {
            debug!("Loaded {} readings from {}", readings.len(), path.display());
            return LoadedTable {
                source: DataSource::File {
                    path: path.display().to_string(),
                },
                readings,
            };
        }
        Ok(_) => format!("{} has no readings", path.display()),
        Err(e) => format!("{e:#}"),
    };

    warn!("Serving built-in sample data: {}", reason);
    LoadedTable {
        source: DataSource::Fallback { reason },
        readings: fallback_readings(),
    }
}

/// Built-in 15-hour sample table, starting 2025-10-01 08:00.
pub fn fallback_readings() -> Vec<SensorReading> {
    // ---
    const MOISTURE: [f64; 15] = [
        45.2, 52.8, 68.4, 71.2, 58.9, 43.7, 39.1, 55.3, 72.6, 81.2, 85.7, 78.9, 65.4, 58.2, 51.7,
    ];
    const PH: [f64; 15] = [
        6.3, 6.5, 6.2, 6.7, 6.4, 6.1, 6.6, 6.3, 6.8, 6.5, 6.2, 6.4, 6.7, 6.3, 6.5,
    ];
    const NITROGEN: [u8; 15] = [1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1];
    const PHOSPHORUS: [u8; 15] = [1, 0, 1, 1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 0];
    const POTASSIUM: [u8; 15] = [1, 1, 0, 1, 1, 1, 1, 1, 1, 0, 1, 1, 1, 1, 1];
    const TEMPERATURE: [f64; 15] = [
        22.5, 24.1, 26.3, 28.7, 31.2, 32.8, 33.5, 32.1, 29.4, 27.8, 25.6, 23.2, 21.5, 20.1, 19.3,
    ];
    const RAIN: [f64; 15] = [
        0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.3, 3.1, 1.8, 0.5, 0.0, 0.0,
    ];
    const IRRIGATION: [u8; 15] = [1, 1, 0, 0, 1, 1, 1, 1, 0, 0, 0, 0, 0, 1, 1];

    let start = NaiveDate::from_ymd_opt(2025, 10, 1)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .unwrap_or_default();

    (0..15)
        .map(|i| SensorReading {
            timestamp: start + Duration::hours(i as i64),
            umidade_solo: Some(MOISTURE[i]),
            ph_solo: Some(PH[i]),
            nitrogenio: Some(NITROGEN[i]),
            fosforo: Some(PHOSPHORUS[i]),
            potassio: Some(POTASSIUM[i]),
            temperatura: Some(TEMPERATURE[i]),
            chuva_mm: Some(RAIN[i]),
            irrigacao_ativa: Some(IRRIGATION[i]),
        })
        .collect()
}

// ---

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
fn sample_std(values: &[f64]) -> Option<f64> {
    // ---
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

fn column(readings: &[SensorReading], field: Field) -> Vec<f64> {
    readings.iter().filter_map(|r| r.value(field)).collect()
}

/// Headline figures shown at the top of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    // ---
    pub mean_moisture: Option<f64>,
    pub std_moisture: Option<f64>,
    pub mean_ph: Option<f64>,
    pub irrigation_count: usize,
    pub irrigation_percentage: Option<f64>,
    pub total_rain_mm: f64,
    pub mean_rain_mm: Option<f64>,
}

impl Metrics {
    pub fn compute(readings: &[SensorReading]) -> Self {
        // ---
        let moisture = column(readings, Field::UmidadeSolo);
        let rain = column(readings, Field::ChuvaMm);
        let irrigation_count = readings.iter().filter(|r| r.is_irrigating()).count();

        Self {
            mean_moisture: mean(&moisture),
            std_moisture: sample_std(&moisture),
            mean_ph: mean(&column(readings, Field::PhSolo)),
            irrigation_count,
            irrigation_percentage: (!readings.is_empty())
                .then(|| irrigation_count as f64 / readings.len() as f64 * 100.0),
            total_rain_mm: rain.iter().sum(),
            mean_rain_mm: mean(&rain),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyIrrigation {
    pub hour: u32,
    pub irrigations: usize,
}

/// Irrigation-active rows per hour of day, for hours that have readings.
pub fn irrigation_by_hour(readings: &[SensorReading]) -> Vec<HourlyIrrigation> {
    // ---
    let mut by_hour: BTreeMap<u32, usize> = BTreeMap::new();
    for r in readings {
        *by_hour.entry(r.timestamp.hour()).or_default() += usize::from(r.is_irrigating());
    }
    by_hour
        .into_iter()
        .map(|(hour, irrigations)| HourlyIrrigation { hour, irrigations })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RainGroup {
    // ---
    pub has_rain: bool,
    pub readings: usize,
    pub irrigations: usize,
    pub mean_moisture: Option<f64>,
}

/// Irrigation totals and mean moisture split by presence of rain.
pub fn rain_vs_irrigation(readings: &[SensorReading]) -> Vec<RainGroup> {
    // ---
    [false, true]
        .into_iter()
        .filter_map(|has_rain| {
            let group: Vec<&SensorReading> = readings
                .iter()
                .filter(|r| (r.chuva_mm.unwrap_or(0.0) > 0.0) == has_rain)
                .collect();
            if group.is_empty() {
                return None;
            }
            let moisture: Vec<f64> = group.iter().filter_map(|r| r.umidade_solo).collect();
            Some(RainGroup {
                has_rain,
                readings: group.len(),
                irrigations: group.iter().filter(|r| r.is_irrigating()).count(),
                mean_moisture: mean(&moisture),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NpkBucket {
    pub npk_total: u8,
    pub count: usize,
}

/// Number of readings per count of available nutrients (0..=3).
pub fn npk_distribution(readings: &[SensorReading]) -> Vec<NpkBucket> {
    // ---
    let mut buckets: BTreeMap<u8, usize> = BTreeMap::new();
    for r in readings {
        let total = [r.nitrogenio, r.fosforo, r.potassio]
            .into_iter()
            .map(|f| f.unwrap_or(0))
            .sum();
        *buckets.entry(total).or_default() += 1;
    }
    buckets
        .into_iter()
        .map(|(npk_total, count)| NpkBucket { npk_total, count })
        .collect()
}

/// Severity of a suggestion, mirroring the dashboard's alert styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub severity: Severity,
    pub message: &'static str,
}

impl Suggestion {
    const fn new(severity: Severity, message: &'static str) -> Self {
        Self { severity, message }
    }
}

/// Rule-based advice for a single reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestions {
    // ---
    pub moisture: Option<Suggestion>,
    pub ph: Option<Suggestion>,
    pub rain: Option<Suggestion>,
}

impl Suggestions {
    pub fn from_latest(latest: &SensorReading) -> Self {
        // ---
        let moisture = latest.umidade_solo.map(|m| {
            if m < IRRIGATION_MOISTURE_THRESHOLD {
                Suggestion::new(Severity::Alert, "Low soil moisture - irrigation recommended")
            } else {
                Suggestion::new(Severity::Success, "Soil moisture adequate")
            }
        });
        let ph = latest.ph_solo.map(|ph| {
            if IDEAL_PH.contains(&ph) {
                Suggestion::new(Severity::Success, "pH ideal for soybean")
            } else {
                Suggestion::new(Severity::Warning, "pH outside the ideal range")
            }
        });
        let rain = latest.chuva_mm.map(|rain| {
            if rain > 0.0 {
                Suggestion::new(Severity::Info, "Rain detected - suspend irrigation")
            } else {
                Suggestion::new(Severity::Info, "No rain - keep monitoring moisture")
            }
        });
        Self { moisture, ph, rain }
    }

    fn iter(&self) -> impl Iterator<Item = &Suggestion> {
        [&self.moisture, &self.ph, &self.rain]
            .into_iter()
            .flatten()
    }
}

/// Everything the dashboard renders, derived from one table snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    // ---
    pub source: DataSource,
    pub record_count: usize,
    pub metrics: Metrics,
    pub irrigation_by_hour: Vec<HourlyIrrigation>,
    pub rain_vs_irrigation: Vec<RainGroup>,
    pub npk_distribution: Vec<NpkBucket>,
    pub latest: Option<SensorReading>,
    pub suggestions: Option<Suggestions>,
}

impl Dashboard {
    pub fn build(table: &LoadedTable) -> Self {
        // ---
        let readings = &table.readings;
        let latest = readings.last().cloned();
        Self {
            source: table.source.clone(),
            record_count: readings.len(),
            metrics: Metrics::compute(readings),
            irrigation_by_hour: irrigation_by_hour(readings),
            rain_vs_irrigation: rain_vs_irrigation(readings),
            npk_distribution: npk_distribution(readings),
            suggestions: latest.as_ref().map(Suggestions::from_latest),
            latest,
        }
    }
}

/// Query parameters for filtering readings.
#[derive(Debug, Default, Deserialize)]
pub struct ReadingFilter {
    // ---
    /// Inclusive range `"start,end"`; either side may be left empty.
    pub timestamp_range: Option<String>,
    pub limit: Option<u32>,
}

type Bounds = (Option<NaiveDateTime>, Option<NaiveDateTime>);

fn parse_range(range: &str) -> Result<Bounds> {
    // ---
    let (start, end) = range
        .split_once(',')
        .ok_or_else(|| anyhow!("timestamp_range must look like \"start,end\""))?;
    let bound = |raw: &str| -> Result<Option<NaiveDateTime>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| anyhow!("invalid timestamp {raw:?} in timestamp_range"))
    };
    Ok((bound(start)?, bound(end)?))
}

impl ReadingFilter {
    /// Apply the filter; `max_rows` caps the limit.
    pub fn apply(&self, readings: Vec<SensorReading>, max_rows: u32) -> Result<Vec<SensorReading>> {
        // ---
        let (start, end) = match &self.timestamp_range {
            Some(range) => parse_range(range)?,
            None => (None, None),
        };
        let limit = self.limit.unwrap_or(max_rows).min(max_rows) as usize;

        debug!("Apply filter: {:?}", self);
        Ok(readings
            .into_iter()
            .filter(|r| start.map_or(true, |s| r.timestamp >= s))
            .filter(|r| end.map_or(true, |e| r.timestamp <= e))
            .take(limit)
            .collect())
    }
}

/// Plain-text rendering of the dashboard for terminals.
pub fn render_report(dashboard: &Dashboard) -> String {
    // ---
    let opt = |v: Option<f64>, unit: &str| {
        v.map(|v| format!("{v:.1}{unit}"))
            .unwrap_or_else(|| "n/a".into())
    };
    let m = &dashboard.metrics;
    let mut out = String::new();

    let source = match &dashboard.source {
        DataSource::File { path } => path.clone(),
        DataSource::Fallback { reason } => format!("built-in sample ({reason})"),
    };
    let _ = writeln!(out, "FarmTech Solutions - soil sensor dashboard");
    let _ = writeln!(out, "Source: {source}");
    let _ = writeln!(out, "Records: {}", dashboard.record_count);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Mean moisture : {} (std {})",
        opt(m.mean_moisture, "%"),
        opt(m.std_moisture, "%")
    );
    let _ = writeln!(out, "Mean pH       : {} (ideal 6.0-6.8)", opt(m.mean_ph, ""));
    let _ = writeln!(
        out,
        "Irrigations   : {} ({} of the time)",
        m.irrigation_count,
        opt(m.irrigation_percentage, "%")
    );
    let _ = writeln!(
        out,
        "Total rain    : {:.1}mm (mean {})",
        m.total_rain_mm,
        opt(m.mean_rain_mm, "mm/h")
    );

    let _ = writeln!(out, "\nIrrigations by hour:");
    for h in &dashboard.irrigation_by_hour {
        let _ = writeln!(out, "  {:02}h  {}", h.hour, h.irrigations);
    }

    let _ = writeln!(out, "\nIrrigation vs rain:");
    for g in &dashboard.rain_vs_irrigation {
        let label = if g.has_rain { "rain   " } else { "no rain" };
        let _ = writeln!(
            out,
            "  {label}  irrigations {}  mean moisture {}",
            g.irrigations,
            opt(g.mean_moisture, "%")
        );
    }

    let _ = writeln!(out, "\nNPK nutrients available:");
    for b in &dashboard.npk_distribution {
        let _ = writeln!(out, "  {}/3  {} readings", b.npk_total, b.count);
    }

    if let (Some(latest), Some(suggestions)) = (&dashboard.latest, &dashboard.suggestions) {
        let _ = writeln!(
            out,
            "\nSuggestions (reading at {}):",
            latest.timestamp.format(TIMESTAMP_FORMAT)
        );
        for s in suggestions.iter() {
            let _ = writeln!(out, "  [{:?}] {}", s.severity, s.message);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn fallback_table() -> LoadedTable {
        LoadedTable {
            source: DataSource::Fallback {
                reason: "test".into(),
            },
            readings: fallback_readings(),
        }
    }

    #[test]
    fn test_fallback_dataset_shape() {
        // ---
        let readings = fallback_readings();
        assert_eq!(readings.len(), 15);
        assert_eq!(readings[0].timestamp.to_string(), "2025-10-01 08:00:00");
        assert_eq!(readings[14].timestamp.to_string(), "2025-10-01 22:00:00");
    }

    #[test]
    fn test_metrics_on_fallback() {
        // ---
        let m = Metrics::compute(&fallback_readings());
        assert!(close(m.mean_moisture.unwrap(), 928.3 / 15.0));
        assert!(close(m.total_rain_mm, 7.8));
        assert!(close(m.mean_rain_mm.unwrap(), 7.8 / 15.0));
        assert_eq!(m.irrigation_count, 8);
        assert!(close(m.irrigation_percentage.unwrap(), 8.0 / 15.0 * 100.0));
        assert!(m.std_moisture.unwrap() > 0.0);
    }

    #[test]
    fn test_three_of_fifteen_irrigating_is_twenty_percent() {
        // ---
        let mut readings = fallback_readings();
        for (i, r) in readings.iter_mut().enumerate() {
            r.irrigacao_ativa = Some(u8::from(i < 3));
        }
        let m = Metrics::compute(&readings);
        assert_eq!(m.irrigation_count, 3);
        assert!(close(m.irrigation_percentage.unwrap(), 20.0));
    }

    #[test]
    fn test_sample_std() {
        // ---
        assert_eq!(sample_std(&[5.0]), None);
        assert!(close(sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap(), (32.0f64 / 7.0).sqrt()));
    }

    #[test]
    fn test_grouped_series() {
        // ---
        let readings = fallback_readings();

        let hourly = irrigation_by_hour(&readings);
        assert_eq!(hourly.len(), 15);
        assert_eq!(hourly[0], HourlyIrrigation { hour: 8, irrigations: 1 });
        assert_eq!(hourly[2], HourlyIrrigation { hour: 10, irrigations: 0 });

        let rain = rain_vs_irrigation(&readings);
        assert_eq!(rain.len(), 2);
        assert!(!rain[0].has_rain);
        assert_eq!(rain[0].readings, 10);
        assert_eq!(rain[0].irrigations, 7);
        assert!(rain[1].has_rain);
        assert_eq!(rain[1].irrigations, 1);

        let npk = npk_distribution(&readings);
        assert_eq!(
            npk,
            vec![
                NpkBucket { npk_total: 2, count: 9 },
                NpkBucket { npk_total: 3, count: 6 },
            ]
        );
    }

    #[test]
    fn test_suggestions_rules() {
        // ---
        let mut r = fallback_readings().pop().unwrap();
        let s = Suggestions::from_latest(&r);
        assert_eq!(s.moisture.unwrap().severity, Severity::Alert);
        assert_eq!(s.ph.unwrap().severity, Severity::Success);
        assert_eq!(s.rain.unwrap().message, "No rain - keep monitoring moisture");

        r.umidade_solo = Some(60.0);
        r.ph_solo = Some(6.9);
        r.chuva_mm = Some(0.2);
        let s = Suggestions::from_latest(&r);
        assert_eq!(s.moisture.unwrap().severity, Severity::Success);
        assert_eq!(s.ph.unwrap().severity, Severity::Warning);
        assert_eq!(s.rain.unwrap().message, "Rain detected - suspend irrigation");

        r.ph_solo = Some(6.0);
        assert_eq!(Suggestions::from_latest(&r).ph.unwrap().severity, Severity::Success);
    }

    #[test]
    fn test_filter_by_range_and_limit() {
        // ---
        let filter = ReadingFilter {
            timestamp_range: Some("2025-10-01 10:00:00,2025-10-01 12:00:00".into()),
            limit: None,
        };
        let out = filter.apply(fallback_readings(), 1000).unwrap();
        assert_eq!(out.len(), 3);

        let open_start = ReadingFilter {
            timestamp_range: Some(",2025-10-01T09:00:00".into()),
            limit: Some(1),
        };
        assert_eq!(open_start.apply(fallback_readings(), 1000).unwrap().len(), 1);

        let capped = ReadingFilter {
            timestamp_range: None,
            limit: Some(500),
        };
        assert_eq!(capped.apply(fallback_readings(), 4).unwrap().len(), 4);

        let bad = ReadingFilter {
            timestamp_range: Some("yesterday".into()),
            limit: None,
        };
        assert!(bad.apply(fallback_readings(), 1000).is_err());
    }

    #[test]
    fn test_dashboard_json_shape() {
        // ---
        let json = serde_json::to_value(Dashboard::build(&fallback_table())).unwrap();

        assert_eq!(json["source"]["kind"], "fallback");
        assert_eq!(json["source"]["reason"], "test");
        assert_eq!(json["record_count"], 15);
        assert_eq!(json["metrics"]["irrigation_count"], 8);
        assert_eq!(json["npk_distribution"][0]["npk_total"], 2);
        assert_eq!(json["suggestions"]["moisture"]["severity"], "alert");
        assert_eq!(json["latest"]["timestamp"], "2025-10-01T22:00:00");
    }

    #[test]
    fn test_missing_file_falls_back() {
        // ---
        let loaded = load_table("/nonexistent/dir/dados_sensores_limpos.csv");
        assert!(matches!(loaded.source, DataSource::Fallback { .. }));
        assert_eq!(loaded.readings.len(), 15);
    }

    #[test]
    fn test_report_mentions_sections() {
        // ---
        let report = render_report(&Dashboard::build(&fallback_table()));
        assert!(report.contains("built-in sample (test)"));
        assert!(report.contains("Records: 15"));
        assert!(report.contains("Irrigations   : 8 (53.3% of the time)"));
        assert!(report.contains("Total rain    : 7.8mm"));
        assert!(report.contains("pH ideal for soybean"));
    }
}
