use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use salesboard_api::ranking::reconcile_totals;
use salesboard_api::state::State;
use salesboard_api::{construct_router, schema};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Salesboard backend");

    let config = config::Config::from_env()?;

    let state = Arc::new(State::new().await?);
    schema::setup(&state.db).await?;
    schema::seed_admin(&state.db).await?;

    // Self-heal any cache drift left behind by a previous run before taking
    // traffic, then keep repairing in the background.
    let repaired = reconcile_totals(&state.db).await?;
    if repaired > 0 {
        tracing::warn!(repaired, "Repaired seller totals at startup");
    }
    if config.reconcile_interval_secs > 0 {
        let db = state.db.clone();
        let interval_secs = config.reconcile_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            interval.tick().await; // immediate first tick, already handled above
            loop {
                interval.tick().await;
                if let Err(err) = reconcile_totals(&db).await {
                    tracing::error!(error = %err, "Totals reconciliation failed");
                }
            }
        });
    }

    let app = construct_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
