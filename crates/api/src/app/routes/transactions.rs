use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;

use bookledger_core::{AccountId, BookId};
use bookledger_infra::{BorrowBook, ReturnBook};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/borrow", post(borrow))
        .route("/return", post(return_book))
}

type Ids = (AccountId, BookId);

fn parse_request(
    body: Result<Json<dto::TransactionRequest>, JsonRejection>,
) -> Result<Ids, axum::response::Response> {
    let Json(body) = body.map_err(|e| errors::invalid_json(e.body_text()))?;
    let account_id = dto::parse_id(&body.user_id, "user")?;
    let book_id = dto::parse_id(&body.book_id, "book")?;
    Ok((account_id, book_id))
}

pub async fn borrow(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::TransactionRequest>, JsonRejection>,
) -> axum::response::Response {
    let (account_id, book_id) = match parse_request(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = BorrowBook {
        account_id,
        book_id,
        occurred_at: Utc::now(),
    };
    match services.engine().borrow(cmd).await {
        Ok(_) => Json(dto::TransactionResponse {
            message: "Book borrowed successfully",
            user_id: account_id,
            book_id,
        })
        .into_response(),
        Err(e) => errors::library_error_to_response(e),
    }
}

pub async fn return_book(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::TransactionRequest>, JsonRejection>,
) -> axum::response::Response {
    let (account_id, book_id) = match parse_request(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = ReturnBook {
        account_id,
        book_id,
        occurred_at: Utc::now(),
    };
    match services.engine().return_book(cmd).await {
        Ok(_) => Json(dto::TransactionResponse {
            message: "Book returned successfully",
            user_id: account_id,
            book_id,
        })
        .into_response(),
        Err(e) => errors::library_error_to_response(e),
    }
}
