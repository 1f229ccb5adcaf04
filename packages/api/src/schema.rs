//! Startup schema bootstrap
//!
//! Tables are created from the entity definitions when missing, so a fresh
//! database file is usable immediately. SQLite needs the foreign-key pragma
//! before the cascades take effect.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Schema, Set,
};

use crate::entity::{goal, sale, seller, user};
use crate::routes::auth::hash_password;

pub async fn setup(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute_unprepared("PRAGMA foreign_keys = ON").await?;

    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    for mut stmt in [
        schema.create_table_from_entity(seller::Entity),
        schema.create_table_from_entity(sale::Entity),
        schema.create_table_from_entity(goal::Entity),
        schema.create_table_from_entity(user::Entity),
    ] {
        stmt.if_not_exists();
        db.execute(backend.build(&stmt)).await?;
    }

    Ok(())
}

/// Create the default `admin` account on first start so the instance can be
/// logged into at all. The password comes from `ADMIN_PASSWORD` and should
/// be changed right after the first login.
pub async fn seed_admin(db: &DatabaseConnection) -> Result<(), DbErr> {
    let existing = user::Entity::find()
        .filter(user::Column::Username.eq("admin"))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
    let password_hash = hash_password(&password)
        .map_err(|err| DbErr::Custom(format!("Failed to hash admin password: {}", err)))?;

    user::ActiveModel {
        username: Set("admin".to_string()),
        password_hash: Set(password_hash),
        full_name: Set(Some("Administrator".to_string())),
        email: Set(Some("admin@example.com".to_string())),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!("Seeded default 'admin' user, change its password after the first login");
    Ok(())
}
