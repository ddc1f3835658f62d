mod app;
mod auth;
mod config;
mod db;
mod envelope;
mod error;
mod images;
mod state;
mod storage;
mod users;
mod validation;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "bidhouse=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let pool = db::connect(&config).await?;
    db::MIGRATOR.run(&pool).await?;
    tracing::info!("migrations applied");

    let app_state = AppState::new(pool, config);
    app::serve(app::build_app(app_state)).await
}
