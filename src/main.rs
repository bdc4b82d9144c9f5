use std::env;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use paradigm_ci::config::AppPaths;
use paradigm_ci::state::AppState;
use paradigm_ci::{logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let state = AppState::initialize(paths).await?;

    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(8700);
    let bind_addr = format!("127.0.0.1:{}", port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!(
        ci_name = %state.config.identity.ci_name,
        "listening on {}",
        addr
    );

    let app: Router = server::router(state);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
