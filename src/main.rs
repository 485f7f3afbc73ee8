pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod security;
pub mod services;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().map_err(anyhow::Error::msg)?;
    tracing::info!(env = %config.app.env, database = %config.database.url, "starting StoryHub backend");

    let pool = db::connect(&config.database)
        .await
        .context("failed to open database")?;

    if config.seed_demo_data {
        let created = db::seed::seed_demo_data(&pool)
            .await
            .context("failed to seed demo data")?;
        tracing::info!(created, "demo data ready");
    }

    api::server::start_server(config, pool).await
}
