use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use bookledger_core::BookId;
use bookledger_infra::LibraryError;
use bookledger_ledger::parse_optional_instant;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_book))
        .route("/:id", get(get_book).delete(delete_book))
        .route("/:id/income", get(get_income))
}

pub async fn create_book(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateBookRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::invalid_json(e.body_text()),
    };

    match services.books().register(&body.title, Utc::now()).await {
        Ok(book) => (StatusCode::CREATED, Json(dto::BookResponse::from(&book))).into_response(),
        Err(e) => errors::library_error_to_response(e),
    }
}

pub async fn get_book(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BookId = match dto::parse_id(&id, "book") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.books().get(id).await {
        Ok(book) => Json(dto::BookResponse::from(&book)).into_response(),
        Err(e) => errors::library_error_to_response(e),
    }
}

pub async fn delete_book(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BookId = match dto::parse_id(&id, "book") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.books().remove(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::library_error_to_response(e),
    }
}

pub async fn get_income(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::IncomeQuery>,
) -> axum::response::Response {
    let id: BookId = match dto::parse_id(&id, "book") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let bounds = parse_optional_instant(query.start_date.as_deref()).and_then(|start| {
        parse_optional_instant(query.end_date.as_deref()).map(|end| (start, end))
    });
    let (start, end) = match bounds {
        Ok(v) => v,
        Err(e) => return errors::library_error_to_response(LibraryError::from(e)),
    };

    match services.reports().income_for(id, start, end, Utc::now()).await {
        Ok(total_income) => Json(dto::IncomeResponse {
            book_id: id,
            total_income,
        })
        .into_response(),
        Err(e) => errors::library_error_to_response(e),
    }
}
