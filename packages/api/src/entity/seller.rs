//! `SeaORM` Entity for sellers on the leaderboard

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sellers")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "Text")]
    pub name: String,
    /// Inline profile picture as a `data:image/...;base64,` URL
    #[sea_orm(column_type = "Text", nullable)]
    pub image: Option<String>,
    /// Denormalized running total in cents. Must equal the sum of this
    /// seller's sale values; every sale mutation adjusts it in the same
    /// transaction.
    #[sea_orm(column_name = "totalSales")]
    pub total_sales: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sale::Entity")]
    Sales,
    #[sea_orm(has_many = "super::goal::Entity")]
    Goals,
}

impl Related<super::sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sales.def()
    }
}

impl Related<super::goal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Goals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
