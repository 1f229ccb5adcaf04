//! Ranking aggregation
//!
//! The ranking is always derived from the sale ledger, never from the
//! denormalized `totalSales` cache: time-windowed views need the per-sale
//! dates anyway, and deriving the unbounded view the same way keeps the two
//! comparable (they must agree whenever no mutation is in flight).

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sea_orm::sea_query::{Alias, Expr, Func, IntoCondition};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, FromQueryResult, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::{Deserialize, Serialize};

use crate::entity::{sale, seller};

/// Time-window selector for the ranking view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    All,
    Today,
    Week,
    Month,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::All => "all",
            Period::Today => "today",
            Period::Week => "week",
            Period::Month => "month",
        }
    }

    /// Inclusive lower bound of the window, or `None` for the unbounded view.
    ///
    /// Windows are computed in UTC. The week starts on Sunday.
    pub fn window_start(&self, now: DateTime<Utc>) -> Option<NaiveDateTime> {
        let today = now.date_naive();
        match self {
            Period::All => None,
            Period::Today => Some(midnight(today)),
            Period::Week => {
                let days_from_sunday = today.weekday().num_days_from_sunday() as u64;
                today
                    .checked_sub_days(Days::new(days_from_sunday))
                    .map(midnight)
            }
            Period::Month => today.with_day(1).map(midnight),
        }
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// One row of the ranking view.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRow {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    /// Sum of qualifying sale values in cents (0 when none qualify)
    pub total_sales: i64,
}

/// Every seller with the sum of their sales inside the window, descending by
/// total. Sellers without qualifying sales are kept at total 0, so the
/// window predicate sits in the join condition rather than a WHERE clause.
pub async fn fetch_ranking<C: ConnectionTrait>(
    db: &C,
    period: Period,
) -> Result<Vec<RankingRow>, DbErr> {
    let window_start = period.window_start(Utc::now());

    let total = Func::coalesce([
        Func::sum(Expr::col((sale::Entity, sale::Column::Value))).into(),
        Expr::val(0_i64).into(),
    ]);

    seller::Entity::find()
        .select_only()
        .column(seller::Column::Id)
        .column(seller::Column::Name)
        .column(seller::Column::Image)
        .column_as(Expr::expr(total), "total_sales")
        .join(
            JoinType::LeftJoin,
            seller::Relation::Sales
                .def()
                .on_condition(move |_seller, _sales| match window_start {
                    Some(start) => sale::Column::Date.gte(start).into_condition(),
                    None => Condition::all(),
                }),
        )
        .group_by(seller::Column::Id)
        .group_by(seller::Column::Name)
        .group_by(seller::Column::Image)
        .order_by_desc(Expr::col(Alias::new("total_sales")))
        .into_model::<RankingRow>()
        .all(db)
        .await
}

/// Self-heal pass for the `totalSales` cache: recompute every seller's ledger
/// sum and rewrite cache entries that drifted. Returns the number of repaired
/// rows. Run at startup and periodically from the server binary.
pub async fn reconcile_totals<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
    let ledger = fetch_ranking(db, Period::All).await?;

    let mut repaired = 0;
    for row in ledger {
        let update = seller::Entity::update_many()
            .col_expr(seller::Column::TotalSales, Expr::val(row.total_sales).into())
            .filter(seller::Column::Id.eq(row.id))
            .filter(seller::Column::TotalSales.ne(row.total_sales))
            .exec(db)
            .await?;
        if update.rows_affected > 0 {
            repaired += update.rows_affected;
            tracing::warn!(
                seller_id = row.id,
                total = row.total_sales,
                "Repaired drifted totalSales cache"
            );
        }
    }

    Ok(repaired)
}
