//! Seller CRUD and per-seller sale history
//!
//! Every mutation here changes ranking data, so each one broadcasts an
//! update signal after it commits.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;

use crate::entity::{sale, seller};
use crate::error::ApiError;
use crate::middleware::session::AuthSession;
use crate::routes::is_image_data_url;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_seller))
        .route("/{id}", put(update_seller))
        .route("/{id}", delete(delete_seller))
        .route("/{id}/sales", get(list_seller_sales))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerPayload {
    pub name: String,
    pub image: Option<String>,
}

/// Shared create/update validation: trimmed name of at least 3 characters,
/// image (when present) in inline data-URL form.
fn validate_seller(payload: &SellerPayload) -> Result<(String, Option<String>), ApiError> {
    let name = payload.name.trim();
    if name.chars().count() < 3 {
        return Err(ApiError::bad_request(
            "Seller name must be at least 3 characters",
        ));
    }
    if let Some(image) = payload.image.as_deref() {
        if !is_image_data_url(image) {
            return Err(ApiError::bad_request(
                "Seller image must be an inline image data URL",
            ));
        }
    }
    Ok((name.to_string(), payload.image.clone()))
}

#[tracing::instrument(name = "POST /sellers", skip(state, session, payload))]
pub async fn create_seller(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Json(payload): Json<SellerPayload>,
) -> Result<(StatusCode, Json<seller::Model>), ApiError> {
    session.require()?;
    let (name, image) = validate_seller(&payload)?;

    let created = seller::ActiveModel {
        name: Set(name),
        image: Set(image),
        total_sales: Set(0),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    state.updates.notify();
    Ok((StatusCode::CREATED, Json(created)))
}

#[tracing::instrument(name = "PUT /sellers/{id}", skip(state, session, payload))]
pub async fn update_seller(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
    Json(payload): Json<SellerPayload>,
) -> Result<Json<seller::Model>, ApiError> {
    session.require()?;
    let (name, image) = validate_seller(&payload)?;

    let existing = seller::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Seller not found"))?;

    let mut active: seller::ActiveModel = existing.into();
    active.name = Set(name);
    active.image = Set(image);
    // totalSales belongs to the sale mutations, never touched here.
    let updated = active.update(&state.db).await?;

    state.updates.notify();
    Ok(Json(updated))
}

#[tracing::instrument(name = "DELETE /sellers/{id}", skip(state, session))]
pub async fn delete_seller(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    session.require()?;

    // Sales and goals go with the seller via ON DELETE CASCADE.
    let result = seller::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(ApiError::not_found("Seller not found"));
    }

    state.updates.notify();
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(name = "GET /sellers/{id}/sales", skip(state, session))]
pub async fn list_seller_sales(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<sale::Model>>, ApiError> {
    session.require()?;

    // An unknown or deleted seller simply has no sales.
    let sales = sale::Entity::find()
        .filter(sale::Column::SellerId.eq(id))
        .order_by_desc(sale::Column::Date)
        .all(&state.db)
        .await?;

    Ok(Json(sales))
}
