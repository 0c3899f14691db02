use core::str::FromStr;

use serde::{Deserialize, Serialize};

use bookledger_accounts::Account;
use bookledger_catalog::{Book, BookStatus};
use bookledger_core::{AccountId, BookId, Money};
use bookledger_infra::AccountOverview;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    /// Opening balance in minor units; absent means zero.
    pub balance: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    pub user_id: String,
    pub book_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub period: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncomeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CreatedUserResponse {
    pub id: AccountId,
    pub account_number: String,
}

impl From<&Account> for CreatedUserResponse {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id_typed(),
            account_number: a.account_number().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BorrowedBookResponse {
    pub id: BookId,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: AccountId,
    pub account_number: String,
    pub balance: Money,
    pub borrowed_books: Vec<BorrowedBookResponse>,
}

impl From<AccountOverview> for UserResponse {
    fn from(o: AccountOverview) -> Self {
        Self {
            id: o.account.id_typed(),
            account_number: o.account.account_number().to_string(),
            balance: o.account.balance(),
            borrowed_books: o
                .borrowed_books
                .iter()
                .map(|b| BorrowedBookResponse {
                    id: b.id_typed(),
                    title: b.title().to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub id: BookId,
    pub title: String,
    pub status: BookStatus,
}

impl From<&Book> for BookResponse {
    fn from(b: &Book) -> Self {
        Self {
            id: b.id_typed(),
            title: b.title().to_string(),
            status: b.status(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IncomeResponse {
    pub book_id: BookId,
    pub total_income: Money,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub message: &'static str,
    pub user_id: AccountId,
    pub book_id: BookId,
}

// -------------------------
// Helpers
// -------------------------

/// Parse a path/body identifier, answering 400 when it is malformed.
pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.trim().parse().map_err(|_| errors::invalid_id(what))
}
