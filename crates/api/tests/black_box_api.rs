use bookledger_api::config::ServerConfig;
use reqwest::StatusCode;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over the in-memory store, on an ephemeral port.
        let app = bookledger_api::app::build_app(&ServerConfig::default())
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn create_user(&self, balance: i64) -> String {
        let (status, body) = self.post("/users", json!({ "balance": balance })).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_book(&self, title: &str) -> String {
        let (status, body) = self.post("/books", json!({ "title": title })).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "available");
        body["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_is_served_outside_the_api_prefix() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn borrow_return_lifecycle() {
    let srv = TestServer::spawn().await;
    let user = srv.create_user(10_000).await;
    let book = srv.create_book("Dune").await;

    let (status, body) = srv
        .post("/transactions/borrow", json!({ "user_id": user, "book_id": book }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book borrowed successfully");
    assert_eq!(body["user_id"], user.as_str());
    assert_eq!(body["book_id"], book.as_str());

    let (_, profile) = srv.get(&format!("/users/{user}")).await;
    assert_eq!(profile["balance"], 10_000);
    assert_eq!(profile["borrowed_books"][0]["id"], book.as_str());
    assert_eq!(profile["borrowed_books"][0]["title"], "Dune");

    let (status, body) = srv
        .post("/transactions/borrow", json!({ "user_id": user, "book_id": book }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "book_unavailable");

    let (status, body) = srv
        .post("/transactions/return", json!({ "user_id": user, "book_id": book }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book returned successfully");

    let (_, profile) = srv.get(&format!("/users/{user}")).await;
    assert_eq!(profile["balance"], 9_000);
    assert_eq!(profile["borrowed_books"].as_array().unwrap().len(), 0);

    let (status, income) = srv.get(&format!("/books/{book}/income")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(income["book_id"], book.as_str());
    assert_eq!(income["total_income"], 1_000);

    let (status, report) = srv.get(&format!("/users/{user}/reports?period=monthly")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["period"], "monthly");
    assert_eq!(report["borrowed_books_count"], 1);
    assert_eq!(report["amount_spent"], 1_000);
    assert!(report.get("start_date").is_some());
    assert!(report.get("end_date").is_some());
}

#[tokio::test]
async fn returning_an_available_book_is_rejected() {
    let srv = TestServer::spawn().await;
    let user = srv.create_user(5_000).await;
    let book = srv.create_book("Emma").await;

    let (status, body) = srv
        .post("/transactions/return", json!({ "user_id": user, "book_id": book }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "book_not_borrowed");

    let (_, profile) = srv.get(&format!("/users/{user}")).await;
    assert_eq!(profile["balance"], 5_000);
}

#[tokio::test]
async fn borrow_needs_enough_balance_for_the_fee() {
    let srv = TestServer::spawn().await;
    let user = srv.create_user(500).await;
    let book = srv.create_book("Ulysses").await;

    let (status, body) = srv
        .post("/transactions/borrow", json!({ "user_id": user, "book_id": book }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "insufficient_balance");

    let (_, b) = srv.get(&format!("/books/{book}")).await;
    assert_eq!(b["status"], "available");
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let srv = TestServer::spawn().await;
    let user = srv.create_user(5_000).await;
    let ghost = "00000000-0000-0000-0000-000000000000";

    let (status, body) = srv
        .post("/transactions/borrow", json!({ "user_id": user, "book_id": ghost }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "book_not_found");

    let (status, body) = srv.get(&format!("/users/{ghost}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "account_not_found");

    let (status, body) = srv.get("/users/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, body) = srv
        .post("/transactions/borrow", json!({ "user_id": "x", "book_id": "y" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn report_period_must_be_monthly_or_annual() {
    let srv = TestServer::spawn().await;
    let user = srv.create_user(0).await;

    let (status, body) = srv.get(&format!("/users/{user}/reports?period=weekly")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_period");

    let (status, body) = srv.get(&format!("/users/{user}/reports")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_period");

    let (status, report) = srv.get(&format!("/users/{user}/reports?period=annual")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["borrowed_books_count"], 0);
    assert_eq!(report["amount_spent"], 0);
}

#[tokio::test]
async fn report_period_is_matched_exactly() {
    let srv = TestServer::spawn().await;
    let user = srv.create_user(0).await;

    for raw in ["%20monthly%20", "monthly%20", "Monthly", "ANNUAL"] {
        let (status, body) = srv.get(&format!("/users/{user}/reports?period={raw}")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "period={raw}");
        assert_eq!(body["error"], "invalid_period");
    }
}

#[tokio::test]
async fn account_creation_validates_balance() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.post("/users", json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["account_number"].as_str().unwrap().len(), 10);
    let (_, profile) = srv.get(&format!("/users/{id}")).await;
    assert_eq!(profile["balance"], 0);

    let (status, body) = srv.post("/users", json!({ "balance": -1 })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn books_can_be_removed_and_income_dates_are_validated() {
    let srv = TestServer::spawn().await;
    let book = srv.create_book("Beloved").await;

    let (status, body) = srv
        .get(&format!("/books/{book}/income?start_date=yesterday"))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_date");

    let (status, body) = srv
        .get(&format!(
            "/books/{book}/income?start_date=2020-01-01&end_date="
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_income"], 0);

    let res = srv
        .client
        .delete(srv.url(&format!("/books/{book}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (status, body) = srv.get(&format!("/books/{book}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "book_not_found");
}
