//! Soil sensor data pipeline for the FarmTech irrigation demo.
//!
//! Two loosely coupled halves share one CSV file:
//! - [`cleaner`] turns a raw sensor export into a normalized, range-valid table
//! - [`dashboard`] reads that table (or a built-in sample) and derives the
//!   metrics, series and suggestions served by [`routes`]
//!
//! Column names, kinds and valid ranges live in [`schema`] only.

pub mod cleaner;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod routes;
pub mod schema;

pub use config::Config;
pub use error::CleanError;
pub use models::{CleaningStats, CleaningSummary, NormalizedTable, SensorReading};
pub use schema::Field;
