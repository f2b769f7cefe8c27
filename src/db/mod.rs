use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use sea_orm::{ entity::prelude::*, sea_query::OnConflict, DatabaseConnection, Set };
use uuid::Uuid;

use crate::error::Result;

pub mod entity;
pub use entity::*;

/// A verified member about to be written to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// External store of verified members.
///
/// Both calls are made at most once per event and are never retried by the
/// caller; implementations report failures and the caller logs them.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// Insert a member. Inserting an already known member is a no-op.
    async fn add_member(&self, member: NewMember) -> Result<()>;

    /// Delete a member by Telegram id. Deleting an unknown member is a no-op.
    async fn remove_member(&self, telegram_id: i64) -> Result<()>;
}

pub struct MemberRepository {
    db: DatabaseConnection,
}

impl MemberRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MemberDirectory for MemberRepository {
    async fn add_member(&self, member: NewMember) -> Result<()> {
        let telegram_id = member.telegram_id;
        let model = entity::member::ActiveModel {
            id: Set(Uuid::new_v4()),
            telegram_id: Set(member.telegram_id),
            first_name: Set(member.first_name),
            last_name: Set(member.last_name),
            username: Set(member.username),
            joined_at: Set(member.joined_at),
        };

        let result = entity::member::Entity
            ::insert(model)
            .on_conflict(
                OnConflict::column(entity::member::Column::TelegramId).do_nothing().to_owned()
            )
            .exec(&self.db).await;

        match result {
            Ok(_) => {
                tracing::info!("Added member {} to the directory", telegram_id);
                Ok(())
            }
            // ON CONFLICT DO NOTHING surfaces as "no row inserted"
            Err(DbErr::RecordNotInserted) => {
                tracing::debug!("Member {} already in the directory", telegram_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_member(&self, telegram_id: i64) -> Result<()> {
        let result = entity::member::Entity
            ::delete_many()
            .filter(entity::member::Column::TelegramId.eq(telegram_id))
            .exec(&self.db).await?;

        tracing::info!(
            "Removed member {} from the directory ({} row(s))",
            telegram_id,
            result.rows_affected
        );
        Ok(())
    }
}
