//! Configuration loader for `farmtech-sensorflow`.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional path environment variable with a default value.
macro_rules! path_env {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from($default))
    };
}

pub const DEFAULT_RAW_CSV: &str = "data/dados_sensores.csv";
pub const DEFAULT_CLEAN_CSV: &str = "database/dados_sensores_limpos.csv";

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Raw sensor export read by the cleaner.
    pub raw_csv: PathBuf,

    /// Normalized CSV written by the cleaner and read by the dashboard.
    pub clean_csv: PathBuf,

    /// TCP port the dashboard API listens on.
    pub dashboard_port: u16,

    /// Upper bound on rows returned by `/api/readings`.
    pub dashboard_max_rows: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_csv: PathBuf::from(DEFAULT_RAW_CSV),
            clean_csv: PathBuf::from(DEFAULT_CLEAN_CSV),
            dashboard_port: 8080,
            dashboard_max_rows: 1000,
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `SENSOR_RAW_CSV` – raw sensor export (default: `data/dados_sensores.csv`)
/// - `SENSOR_CLEAN_CSV` – normalized output (default: `database/dados_sensores_limpos.csv`)
/// - `DASHBOARD_PORT` – dashboard API port (default: 8080)
/// - `DASHBOARD_MAX_ROWS` – row cap for `/api/readings` (default: 1000)
///
/// Returns an error if a numeric variable is set but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let raw_csv = path_env!("SENSOR_RAW_CSV", DEFAULT_RAW_CSV);
    let clean_csv = path_env!("SENSOR_CLEAN_CSV", DEFAULT_CLEAN_CSV);
    let dashboard_port = parse_env!("DASHBOARD_PORT", u16, 8080);
    let dashboard_max_rows = parse_env!("DASHBOARD_MAX_ROWS", u32, 1000);

    if dashboard_max_rows == 0 {
        return Err(anyhow!("Invalid DASHBOARD_MAX_ROWS: must be greater than 0"));
    }

    Ok(Config {
        raw_csv,
        clean_csv,
        dashboard_port,
        dashboard_max_rows,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  SENSOR_RAW_CSV     : {}", self.raw_csv.display());
        tracing::info!("  SENSOR_CLEAN_CSV   : {}", self.clean_csv.display());
        tracing::info!("  DASHBOARD_PORT     : {}", self.dashboard_port);
        tracing::info!("  DASHBOARD_MAX_ROWS : {}", self.dashboard_max_rows);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_defaults() {
        // ---
        let cfg = Config::default();
        assert_eq!(cfg.clean_csv, PathBuf::from(DEFAULT_CLEAN_CSV));
        assert_eq!(cfg.dashboard_port, 8080);
        assert_eq!(cfg.dashboard_max_rows, 1000);
    }

    // Environment is process-global, so everything touching it stays in
    // one test.
    #[test]
    fn test_load_from_env() {
        // ---
        env::set_var("SENSOR_RAW_CSV", "/tmp/raw.csv");
        env::set_var("DASHBOARD_PORT", "9090");
        env::remove_var("SENSOR_CLEAN_CSV");
        env::remove_var("DASHBOARD_MAX_ROWS");

        let cfg = load_from_env().unwrap();
        assert_eq!(cfg.raw_csv, PathBuf::from("/tmp/raw.csv"));
        assert_eq!(cfg.clean_csv, PathBuf::from(DEFAULT_CLEAN_CSV));
        assert_eq!(cfg.dashboard_port, 9090);

        env::set_var("DASHBOARD_PORT", "not-a-port");
        let err = load_from_env().unwrap_err();
        assert!(err.to_string().contains("DASHBOARD_PORT"));

        env::set_var("DASHBOARD_PORT", "8080");
        env::set_var("DASHBOARD_MAX_ROWS", "0");
        assert!(load_from_env().is_err());

        env::remove_var("SENSOR_RAW_CSV");
        env::remove_var("DASHBOARD_PORT");
        env::remove_var("DASHBOARD_MAX_ROWS");
    }
}
