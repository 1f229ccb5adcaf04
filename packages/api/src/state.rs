use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::sync::Arc;

use crate::alerting::SaleAlerter;
use crate::notify::UpdateBroadcaster;

pub type AppState = Arc<State>;

const DEFAULT_DATABASE_URL: &str = "sqlite://salesboard.db?mode=rwc";

pub struct State {
    pub db: DatabaseConnection,
    /// One-to-many "ranking changed" signal for live views
    pub updates: UpdateBroadcaster,
    pub alerter: SaleAlerter,
    /// HS256 key for the session-cookie tokens
    pub session_secret: String,
}

impl State {
    /// Build the state from the environment. Constructed once at startup and
    /// injected into every handler through the router.
    pub async fn new() -> Result<Self, DbErr> {
        let db_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let mut opt = ConnectOptions::new(db_url);
        opt.max_connections(10)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let db = Database::connect(opt).await?;

        Ok(Self::with_db(db))
    }

    pub fn with_db(db: DatabaseConnection) -> Self {
        let session_secret = std::env::var("SESSION_SECRET").unwrap_or_else(|_| {
            tracing::warn!("SESSION_SECRET not set, using an insecure development secret");
            "salesboard-dev-secret".to_string()
        });

        Self {
            db,
            updates: UpdateBroadcaster::new(),
            alerter: SaleAlerter::from_env(),
            session_secret,
        }
    }
}
