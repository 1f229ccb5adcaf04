//! `SeaORM` Entity for seller goals
//!
//! Present in the schema for the admin UI; deleted together with the owning
//! seller. No aggregation reads from this table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "goals")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_name = "sellerId")]
    pub seller_id: i64,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    /// Target value in cents
    #[sea_orm(column_name = "targetValue")]
    pub target_value: i64,
    #[sea_orm(column_name = "startDate")]
    pub start_date: DateTime,
    #[sea_orm(column_name = "endDate")]
    pub end_date: DateTime,
    /// "pending", "reached" or "expired"
    #[sea_orm(column_type = "Text", default_value = "pending")]
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::seller::Entity",
        from = "Column::SellerId",
        to = "super::seller::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Seller,
}

impl Related<super::seller::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Seller.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
