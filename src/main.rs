//! Application entry point for `farmtech-sensorflow`.
//!
//! Commands:
//! - `clean` (default) – clean the raw sensor export into the normalized CSV
//!   and print the run summary
//! - `report` – print the dashboard figures derived from the normalized CSV
//! - `serve` – expose the dashboard data over HTTP
//!
//! # Environment Variables
//! - `SENSOR_RAW_CSV`, `SENSOR_CLEAN_CSV`, `DASHBOARD_PORT`,
//!   `DASHBOARD_MAX_ROWS` – see [`farmtech_sensorflow::config`]
//! - `FARMTECH_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `FARMTECH_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, net::SocketAddr};

use anyhow::{bail, Result};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use farmtech_sensorflow::{cleaner, config, dashboard, routes, Config};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    match env::args().nth(1).as_deref() {
        None | Some("clean") => clean(&cfg),
        Some("report") => {
            let table = dashboard::load_table(&cfg.clean_csv);
            println!("{}", dashboard::render_report(&dashboard::Dashboard::build(&table)));
            Ok(())
        }
        Some("serve") => serve(cfg).await,
        Some(other) => bail!("unknown command {other:?} (expected clean, report or serve)"),
    }
}

fn clean(cfg: &Config) -> Result<()> {
    // ---
    println!("FarmTech Solutions - sensor data preparation");
    println!("{}", "=".repeat(60));

    // Reported once, by `main`'s error return
    let summary = cleaner::run(cfg)?;

    println!("\nProcessed data statistics:");
    println!("{summary}");
    println!("Saved to      : {}", cfg.clean_csv.display());

    println!("\nNext steps:");
    println!("1. Open the relational database client");
    println!("2. Import {}", cfg.clean_csv.display());
    println!("3. Run the reporting queries against the imported table");
    Ok(())
}

async fn serve(cfg: Config) -> Result<()> {
    // ---
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.dashboard_port));
    let app = routes::router(cfg);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY on stderr
/// - Span event emission mode controlled by the `FARMTECH_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else `FARMTECH_LOG_LEVEL`
///
/// Logs go to stderr so the summary and report on stdout stay clean.
fn init_tracing() {
    // ---
    let span_events = match env::var("FARMTECH_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stderr().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("FARMTECH_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
