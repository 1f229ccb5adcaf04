//! Read-only dashboard metrics for the admin UI

use axum::{Extension, Json, Router, extract::State, routing::get};
use chrono::NaiveDateTime;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, JoinType, PaginatorTrait, QueryOrder, QuerySelect,
    RelationTrait,
};
use serde::Serialize;

use crate::entity::{sale, seller};
use crate::error::ApiError;
use crate::middleware::session::AuthSession;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}

#[derive(Debug, FromQueryResult, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSale {
    pub seller_name: String,
    /// Value in cents
    pub value: i64,
    pub date: NaiveDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_sellers: u64,
    /// Sum of all cached seller totals, in cents
    pub total_sales: i64,
    pub registered_sales: u64,
    pub recent_sales: Vec<RecentSale>,
}

#[tracing::instrument(name = "GET /dashboard/metrics", skip(state, session))]
pub async fn metrics(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<DashboardMetrics>, ApiError> {
    session.require()?;

    let total_sellers = seller::Entity::find().count(&state.db).await?;
    let registered_sales = sale::Entity::find().count(&state.db).await?;

    let total_sales: Option<i64> = seller::Entity::find()
        .select_only()
        .column_as(
            Expr::expr(Func::coalesce([
                Func::sum(Expr::col((seller::Entity, seller::Column::TotalSales))).into(),
                Expr::val(0_i64).into(),
            ])),
            "total",
        )
        .into_tuple()
        .one(&state.db)
        .await?;

    let recent_sales = sale::Entity::find()
        .select_only()
        .column_as(seller::Column::Name, "seller_name")
        .column(sale::Column::Value)
        .column(sale::Column::Date)
        .join(JoinType::InnerJoin, sale::Relation::Seller.def())
        .order_by_desc(sale::Column::Date)
        .limit(5)
        .into_model::<RecentSale>()
        .all(&state.db)
        .await?;

    Ok(Json(DashboardMetrics {
        total_sellers,
        total_sales: total_sales.unwrap_or(0),
        registered_sales,
        recent_sales,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{admin_session, insert_sale, insert_seller, test_state};
    use crate::ranking::reconcile_totals;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn metrics_are_gated() {
        let state = test_state().await;
        let err = metrics(State(state), Extension(AuthSession::Guest))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn metrics_summarize_the_store() {
        let state = test_state().await;
        let ana = insert_seller(&state.db, "Ana").await;
        let beto = insert_seller(&state.db, "Beto").await;

        let now = Utc::now().naive_utc();
        for offset in 0..6_i64 {
            let value = 1_000 * (offset + 1);
            insert_sale(&state.db, ana.id, value, now - Duration::minutes(offset)).await;
        }
        insert_sale(&state.db, beto.id, 500, now - Duration::hours(1)).await;
        // The raw inserts skipped cache maintenance; bring it back in sync.
        reconcile_totals(&state.db).await.unwrap();

        let Json(metrics) = metrics(State(state), Extension(admin_session()))
            .await
            .unwrap();

        assert_eq!(metrics.total_sellers, 2);
        assert_eq!(metrics.registered_sales, 7);
        assert_eq!(metrics.total_sales, 21_000 + 500);
        assert_eq!(metrics.recent_sales.len(), 5);
        // Newest first, all from Ana (Beto's sale is older).
        assert_eq!(metrics.recent_sales[0].seller_name, "Ana");
        assert_eq!(metrics.recent_sales[0].value, 1_000);
    }
}
