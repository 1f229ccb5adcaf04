//! Sale mutations
//!
//! Each operation pairs the ledger write with the incremental adjustment of
//! the owner's `totalSales` inside one transaction, so the cache can never
//! observably disagree with the ledger. The update broadcast fires only
//! after the transaction commits.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post, put},
};
use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;

use crate::entity::{sale, seller};
use crate::error::ApiError;
use crate::middleware::session::AuthSession;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_sale))
        .route("/{id}", put(update_sale))
        .route("/{id}", delete(delete_sale))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub seller_id: i64,
    /// Sale value in cents
    pub value: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSaleRequest {
    /// New sale value in cents
    pub value: i64,
}

/// `UPDATE sellers SET totalSales = totalSales + delta WHERE id = ?`
async fn adjust_seller_total<C: sea_orm::ConnectionTrait>(
    db: &C,
    seller_id: i64,
    delta: i64,
) -> Result<(), sea_orm::DbErr> {
    seller::Entity::update_many()
        .col_expr(
            seller::Column::TotalSales,
            Expr::col(seller::Column::TotalSales).add(delta),
        )
        .filter(seller::Column::Id.eq(seller_id))
        .exec(db)
        .await?;
    Ok(())
}

#[tracing::instrument(name = "POST /sales", skip(state, session, req))]
pub async fn create_sale(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Json(req): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<sale::Model>), ApiError> {
    session.require()?;

    if req.value <= 0 {
        return Err(ApiError::bad_request("Sale value must be greater than zero"));
    }

    let txn = state.db.begin().await?;

    let owner = seller::Entity::find_by_id(req.seller_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::not_found("Seller not found"))?;

    let created = sale::ActiveModel {
        seller_id: Set(owner.id),
        value: Set(req.value),
        date: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    adjust_seller_total(&txn, owner.id, req.value).await?;
    txn.commit().await?;

    state.updates.notify();
    // Best-effort; a webhook failure never reaches this caller.
    state.alerter.dispatch_sale_alert(&owner.name, created.value);

    Ok((StatusCode::CREATED, Json(created)))
}

#[tracing::instrument(name = "PUT /sales/{id}", skip(state, session, req))]
pub async fn update_sale(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSaleRequest>,
) -> Result<Json<sale::Model>, ApiError> {
    session.require()?;

    if req.value <= 0 {
        return Err(ApiError::bad_request("Sale value must be greater than zero"));
    }

    let txn = state.db.begin().await?;

    let existing = sale::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale not found"))?;

    // Adjust the cache by the difference instead of rescanning the ledger.
    let delta = req.value - existing.value;
    let owner_id = existing.seller_id;

    let mut active: sale::ActiveModel = existing.into();
    active.value = Set(req.value);
    let updated = active.update(&txn).await?;

    adjust_seller_total(&txn, owner_id, delta).await?;
    txn.commit().await?;

    state.updates.notify();
    Ok(Json(updated))
}

#[tracing::instrument(name = "DELETE /sales/{id}", skip(state, session))]
pub async fn delete_sale(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    session.require()?;

    let txn = state.db.begin().await?;

    let existing = sale::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale not found"))?;

    let value = existing.value;
    let owner_id = existing.seller_id;

    sale::Entity::delete_by_id(id).exec(&txn).await?;
    adjust_seller_total(&txn, owner_id, -value).await?;
    txn.commit().await?;

    state.updates.notify();
    Ok(StatusCode::NO_CONTENT)
}
