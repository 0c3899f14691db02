use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use bookledger_core::{AccountId, Money};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_user))
        .route("/:id", get(get_user))
        .route("/:id/reports", get(get_report))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateUserRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::invalid_json(e.body_text()),
    };
    let balance = Money::from_minor(body.balance.unwrap_or(0));

    match services.accounts().create(balance, Utc::now()).await {
        Ok(account) => (
            StatusCode::CREATED,
            Json(dto::CreatedUserResponse::from(&account)),
        )
            .into_response(),
        Err(e) => errors::library_error_to_response(e),
    }
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: AccountId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.account_overview(id).await {
        Ok(overview) => Json(dto::UserResponse::from(overview)).into_response(),
        Err(e) => errors::library_error_to_response(e),
    }
}

pub async fn get_report(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::ReportQuery>,
) -> axum::response::Response {
    let id: AccountId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let period = query.period.unwrap_or_default();

    match services.reports().report_for(id, &period, Utc::now()).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::library_error_to_response(e),
    }
}
