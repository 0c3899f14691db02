use anyhow::Context;

use bookledger_api::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bookledger_observability::init();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        borrow_fee = %config.ledger.borrow_fee,
        persistent = config.database_url.is_some(),
        "starting library api"
    );

    let app = bookledger_api::app::build_app(&config)
        .await
        .context("failed to build application")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
