use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use reuse_optimizer::assign;
use reuse_optimizer::config::EngineConfig;
use reuse_optimizer::loader::{self, RecordSet};
use reuse_optimizer::report::{self, Report};
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct AssignRequest {
    records: RecordSet,
    #[serde(default)]
    config: EngineConfig,
}

#[derive(Serialize)]
struct AssignResponse {
    report: Report,
    warnings: Vec<String>,
}

async fn assign_stock(
    Json(req): Json<AssignRequest>,
) -> Result<Json<AssignResponse>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /assign"
    );

    req.config
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let records = loader::load(&req.records);
    let warnings = records.warnings.iter().map(|w| w.to_string()).collect();

    let solution = assign(records.demands, records.reclaimed, records.market, req.config)
        .map_err(|e| {
            tracing::error!(error = %e, "assignment failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    Ok(Json(AssignResponse {
        report: report::build(&solution),
        warnings,
    }))
}

#[tokio::main]
async fn main() {
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/assign", post(assign_stock))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listener");
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.expect("server error");
}
