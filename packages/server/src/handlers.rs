//! HTTP handler functions for the dashboard API.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, web};
use crime_dash_analytics::run_view;
use crime_dash_analytics_models::{ErrorKind, View, ViewBody, ViewOutcome};
use crime_dash_forecast::ArimaOrder;
use crime_dash_server_models::{ApiHealth, ViewQueryParams};

use crate::AppState;

/// HTTP status for an outcome: filter errors are the caller's fault, model
/// errors mean the data cannot support the request.
#[must_use]
pub const fn status_for<T>(outcome: &ViewOutcome<T>) -> StatusCode {
    match outcome.error_kind() {
        None => StatusCode::OK,
        Some(ErrorKind::Filter) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::Model) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(ErrorKind::Store) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(outcome: &ViewOutcome<ViewBody>) -> HttpResponse {
    HttpResponse::build(status_for(outcome)).json(outcome)
}

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        store_available: state.store_path.exists(),
    })
}

/// `GET /api/views/{view}`
///
/// Runs the named view with the filter given as query parameters. The
/// forecast view also reads `p`, `d`, and `q`.
pub async fn view(
    state: web::Data<AppState>,
    name: web::Path<String>,
    params: web::Query<ViewQueryParams>,
) -> HttpResponse {
    let Ok(view) = name.parse::<View>() else {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("Unknown view {:?}", name.as_str()),
        }));
    };

    let filter = match params.time_filter() {
        Ok(filter) => filter,
        Err(e) => return respond(&ViewOutcome::error(ErrorKind::Filter, e.to_string())),
    };

    let order = if view == View::Forecast {
        match params.arima_order() {
            Ok(order) => order,
            Err(e) => return respond(&ViewOutcome::error(ErrorKind::Filter, e.to_string())),
        }
    } else {
        ArimaOrder::default()
    };

    let store_path = state.store_path.clone();
    match web::block(move || run_view(&store_path, view, &filter, order)).await {
        Ok(outcome) => respond(&outcome),
        Err(e) => {
            log::error!("{view} view did not complete: {e}");
            respond(&ViewOutcome::error(ErrorKind::Store, e.to_string()))
        }
    }
}
