//! `SeaORM` Entity for administrative user accounts

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "Text", unique)]
    pub username: String,
    /// argon2id hash in PHC string format (salt embedded)
    #[sea_orm(column_name = "passwordHash", column_type = "Text")]
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sea_orm(column_name = "fullName", column_type = "Text", nullable)]
    pub full_name: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub email: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub phone: Option<String>,
    /// Inline profile picture as a data URL
    #[sea_orm(column_name = "profilePic", column_type = "Text", nullable)]
    pub profile_pic: Option<String>,
    #[sea_orm(column_name = "createdAt")]
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
