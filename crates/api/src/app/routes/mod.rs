use axum::Router;

pub mod books;
pub mod system;
pub mod transactions;
pub mod users;

/// Router for everything under `/api/v1`.
pub fn router() -> Router {
    Router::new()
        .nest("/users", users::router())
        .nest("/books", books::router())
        .nest("/transactions", transactions::router())
}
