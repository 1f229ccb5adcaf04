use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower::ServiceBuilder;
use tower_http::{
    compression::{CompressionLayer, DefaultPredicate, Predicate, predicate::NotForContentType},
    cors::CorsLayer,
    decompression::RequestDecompressionLayer,
};

pub mod entity;
mod middleware;
mod routes;

pub mod alerting;
pub mod error;
pub mod notify;
pub mod ranking;
pub mod schema;
pub mod state;

pub mod auth {
    pub use crate::middleware::session::{AuthSession, SESSION_COOKIE};
}

pub use axum;
pub use sea_orm;

use middleware::session::session_middleware;
use state::AppState;

pub fn construct_router(state: AppState) -> Router {
    let router = Router::new()
        .nest("/health", routes::health::routes())
        .nest("/auth", routes::auth::routes())
        .nest("/sellers", routes::sellers::routes())
        .nest("/sales", routes::sales::routes())
        .nest("/ranking", routes::ranking::routes())
        .nest("/dashboard", routes::dashboard::routes())
        .with_state(state.clone())
        .route("/version", get(|| async { env!("CARGO_PKG_VERSION") }))
        .layer(from_fn_with_state(state, session_middleware))
        .layer(CorsLayer::permissive())
        .layer(
            ServiceBuilder::new()
                .layer(RequestDecompressionLayer::new())
                .layer(CompressionLayer::new().compress_when(
                    DefaultPredicate::new().and(NotForContentType::new("text/event-stream")),
                )),
        );

    Router::new().nest("/api/v1", router)
}
