#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Standalone API server. Reads the store path from `CRIME_DASH_DB`.

use std::path::PathBuf;

use crime_dash_ingest_models::DEFAULT_STORE_PATH;
use crime_dash_server::run_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let store_path = std::env::var("CRIME_DASH_DB")
        .map_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH), PathBuf::from);

    run_server(store_path).await
}
