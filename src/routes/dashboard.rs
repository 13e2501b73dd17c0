//! Dashboard endpoints.
//!
//! Every request loads the normalized table afresh and derives its response
//! from that snapshot; a missing or unreadable file is answered from the
//! built-in sample table, never with an error.
use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::dashboard::{load_table, render_report, Dashboard, DataSource, ReadingFilter};
use crate::{Config, SensorReading};

// ---

pub fn router() -> Router<Config> {
    // ---
    Router::new()
        .route("/api/readings", get(readings))
        .route("/api/dashboard", get(dashboard))
        .route("/api/report", get(report))
}

/// Response body for `/api/readings`.
#[derive(Serialize)]
struct ReadingsResponse {
    source: DataSource,
    count: usize,
    readings: Vec<SensorReading>,
}

async fn readings(
    Query(filter): Query<ReadingFilter>,
    State(config): State<Config>,
) -> impl IntoResponse {
    // ---
    info!("GET /api/readings");

    let table = load_table(&config.clean_csv);
    match filter.apply(table.readings, config.dashboard_max_rows) {
        Ok(readings) => {
            info!("Returning {} readings", readings.len());
            let body = ReadingsResponse {
                source: table.source,
                count: readings.len(),
                readings,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            warn!("Rejected filter: {:#}", e);
            (StatusCode::BAD_REQUEST, Json(e.to_string())).into_response()
        }
    }
}

async fn dashboard(State(config): State<Config>) -> Json<Dashboard> {
    // ---
    info!("GET /api/dashboard");
    Json(Dashboard::build(&load_table(&config.clean_csv)))
}

async fn report(State(config): State<Config>) -> String {
    // ---
    info!("GET /api/report");
    render_report(&Dashboard::build(&load_table(&config.clean_csv)))
}
