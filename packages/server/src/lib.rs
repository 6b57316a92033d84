#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web JSON API for the crime dashboard views.
//!
//! Every view is served under `/api/views/{name}` with the time filter in
//! the query string. Views run on the blocking thread pool, each opening
//! its own read-only store connection.

mod handlers;

use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};

pub use handlers::status_for;

/// Shared application state.
pub struct AppState {
    /// The store every view reads.
    pub store_path: PathBuf,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/views/{view}", web::get().to(handlers::view)),
    );
}

/// Starts the API server over the store at `store_path`.
///
/// Binds to `BIND_ADDR` (default `127.0.0.1`) and `PORT` (default `8080`).
/// This is a regular async function; the caller provides the runtime (e.g.
/// via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
pub async fn run_server(store_path: PathBuf) -> std::io::Result<()> {
    if !store_path.exists() {
        log::warn!(
            "Store {} does not exist yet; views will report store errors",
            store_path.display()
        );
    }

    let state = web::Data::new(AppState { store_path });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use crime_dash_analytics_models::{ErrorKind, ViewOutcome};
    use crime_dash_database::fixtures::{incident, store_with};
    use std::path::Path;

    fn seeded_store(dir: &Path) -> PathBuf {
        store_with(
            dir,
            &[
                incident("R1", (2008, 1, 14), "ROBBERY", Some("SIDEWALK"), true),
                incident("R2", (2008, 2, 14), "ROBBERY", Some("SIDEWALK"), true),
                incident("R3", (2009, 1, 14), "ROBBERY", Some("SIDEWALK"), true),
            ],
        )
    }

    async fn get(store_path: PathBuf, uri: &str) -> (StatusCode, serde_json::Value) {
        let app = actix_web::test::init_service(
            App::new()
                .app_data(web::Data::new(AppState { store_path }))
                .configure(configure),
        )
        .await;
        let req = actix_web::test::TestRequest::get().uri(uri).to_request();
        let resp = actix_web::test::call_service(&app, req).await;
        let status = resp.status();
        let body: serde_json::Value = actix_web::test::read_body_json(resp).await;
        (status, body)
    }

    #[test]
    fn maps_outcomes_to_statuses() {
        let ok: ViewOutcome<()> = ViewOutcome::Empty;
        assert_eq!(status_for(&ok), StatusCode::OK);
        let filter: ViewOutcome<()> = ViewOutcome::error(ErrorKind::Filter, "x");
        assert_eq!(status_for(&filter), StatusCode::BAD_REQUEST);
        let model: ViewOutcome<()> = ViewOutcome::error(ErrorKind::Model, "x");
        assert_eq!(status_for(&model), StatusCode::UNPROCESSABLE_ENTITY);
        let store: ViewOutcome<()> = ViewOutcome::error(ErrorKind::Store, "x");
        assert_eq!(status_for(&store), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn health_reports_store() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get(dir.path().join("none.duckdb"), "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
        assert_eq!(body["storeAvailable"], false);
    }

    #[actix_web::test]
    async fn serves_filtered_view() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded_store(dir.path());

        let (status, body) = get(path, "/api/views/summary?year=2008").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "data");
        assert_eq!(body["body"]["totalCrimes"], 2);
    }

    #[actix_web::test]
    async fn unmatched_filter_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded_store(dir.path());

        let (status, body) = get(path, "/api/views/time-trend?year=2015").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "empty");
    }

    #[actix_web::test]
    async fn bad_filter_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded_store(dir.path());

        let (status, body) = get(path, "/api/views/hourly?month=13").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["body"]["kind"], "filter");
    }

    #[actix_web::test]
    async fn missing_store_is_500() {
        let dir = tempfile::tempdir().unwrap();

        let (status, body) = get(dir.path().join("none.duckdb"), "/api/views/locations").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["body"]["kind"], "store");
    }

    #[actix_web::test]
    async fn short_forecast_is_422() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded_store(dir.path());

        let (status, body) = get(path, "/api/views/forecast?p=5&d=2&q=5").await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["body"]["kind"], "model");
    }

    #[actix_web::test]
    async fn unknown_view_is_404() {
        let dir = tempfile::tempdir().unwrap();

        let (status, _) = get(dir.path().join("none.duckdb"), "/api/views/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
