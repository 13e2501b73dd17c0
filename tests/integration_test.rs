use std::fs;

use anyhow::Result;
use chrono::{NaiveDateTime, Timelike};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::net::TcpListener;

use farmtech_sensorflow::{cleaner, routes, Config};

#[derive(Debug, Deserialize)]
struct Source {
    kind: String,
}

#[derive(Debug, Deserialize)]
struct Reading {
    timestamp: NaiveDateTime,
    umidade_solo: Option<f64>,
    ph_solo: Option<f64>,
    irrigacao_ativa: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct ReadingsResponse {
    source: Source,
    count: usize,
    readings: Vec<Reading>,
}

#[derive(Debug, Deserialize)]
struct Metrics {
    irrigation_count: usize,
    irrigation_percentage: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Dashboard {
    source: Source,
    record_count: usize,
    metrics: Metrics,
}

/// Serve the API on an ephemeral port and return its base URL.
async fn spawn_app(config: Config) -> Result<String> {
    // ---
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, routes::router(config)).await.ok();
    });
    Ok(format!("http://{addr}"))
}

fn scratch_config() -> (Config, std::path::PathBuf) {
    // ---
    let dir = std::env::temp_dir().join(format!("farmtech-http-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    let cfg = Config {
        raw_csv: dir.join("raw.csv"),
        clean_csv: dir.join("clean.csv"),
        dashboard_max_rows: 10,
        ..Config::default()
    };
    (cfg, dir)
}

#[tokio::test]
async fn health_is_ok() -> Result<()> {
    // ---
    let (cfg, dir) = scratch_config();
    let base = spawn_app(cfg).await?;

    let resp = Client::new().get(format!("{base}/health")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await?, r#"{"status":"ok"}"#);

    fs::remove_dir_all(dir)?;
    Ok(())
}

#[tokio::test]
async fn missing_file_serves_sample_dashboard() -> Result<()> {
    // ---
    let (cfg, dir) = scratch_config();
    let base = spawn_app(cfg).await?;

    let board: Dashboard = Client::new()
        .get(format!("{base}/api/dashboard"))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(board.source.kind, "fallback");
    assert_eq!(board.record_count, 15);
    assert_eq!(board.metrics.irrigation_count, 8);

    // The readings cap still applies to the sample table
    let readings: ReadingsResponse = Client::new()
        .get(format!("{base}/api/readings"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(readings.count, 10);

    fs::remove_dir_all(dir)?;
    Ok(())
}

#[tokio::test]
async fn cleaned_data_is_served_and_filtered() -> Result<()> {
    // ---
    let (cfg, dir) = scratch_config();
    let mut raw = String::from("timestamp,umidade_solo,ph_solo,irrigacao_ativa,sensor\n");
    for i in 0..15 {
        let irrigating = u8::from(i < 3);
        raw.push_str(&format!("2025-10-01 {:02}:00:00,{},6.4,{irrigating},S1\n", 8 + i, 50 + i));
    }
    fs::write(&cfg.raw_csv, raw)?;
    tokio_test::assert_ok!(cleaner::run(&cfg));

    let base = spawn_app(cfg.clone()).await?;
    let client = Client::new();

    let board: Dashboard = client
        .get(format!("{base}/api/dashboard"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(board.source.kind, "file");
    assert_eq!(board.metrics.irrigation_count, 3);
    assert_eq!(board.metrics.irrigation_percentage, Some(20.0));

    let url = format!(
        "{base}/api/readings?timestamp_range=2025-10-01T10:00:00,2025-10-01T11:00:00&limit=50"
    );
    let filtered: ReadingsResponse = client.get(&url).send().await?.json().await?;
    assert_eq!(filtered.source.kind, "file");
    assert_eq!(filtered.count, 2);
    for r in &filtered.readings {
        assert!(matches!(r.timestamp.hour(), 10 | 11));
        assert_eq!(r.ph_solo, Some(6.4));
        assert!(r.umidade_solo.unwrap() <= 100.0);
        assert!(r.irrigacao_ativa.is_some());
    }

    let bad = client
        .get(format!("{base}/api/readings?timestamp_range=garbage"))
        .send()
        .await?;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let report = client.get(format!("{base}/api/report")).send().await?.text().await?;
    assert!(report.contains("Records: 15"));

    fs::remove_dir_all(dir)?;
    Ok(())
}
