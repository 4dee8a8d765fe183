use async_trait::async_trait;
use chatrs_core::{ChatRecord, ChatStore, ChatSummary, Turn};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Schema, Set,
};
use tracing::{debug, info};

use crate::entity::chats;

fn is_table_already_exists_error(err: &DbErr) -> bool {
    err.to_string().contains("table") && err.to_string().contains("already exists")
}

fn into_record(model: chats::Model) -> anyhow::Result<ChatRecord> {
    let turns: Vec<Turn> = serde_json::from_str(&model.turns)?;
    Ok(ChatRecord {
        id: model.id,
        title: model.title,
        user_id: model.user_id,
        created_at: model.created_at.and_utc(),
        turns,
        path: model.path,
    })
}

/// Chat records in a SQL database, one row per session.
pub struct SqlChatStore {
    db: DatabaseConnection,
}

impl SqlChatStore {
    /// Connect to `database_url` and create the `chats` table if missing.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        info!("Connecting to chat database");
        let db = Database::connect(database_url).await?;

        let backend = db.get_database_backend();
        let schema = Schema::new(backend);
        let stmt = schema.create_table_from_entity(chats::Entity);
        match db
            .execute_unprepared(&backend.build(&stmt).to_string())
            .await
        {
            Ok(_) => {}
            Err(e) if is_table_already_exists_error(&e) => {
                debug!("Table chats already exists, skipping creation");
            }
            Err(e) => return Err(e.into()),
        }

        info!("SqlChatStore initialized");
        Ok(Self { db })
    }
}

#[async_trait]
impl ChatStore for SqlChatStore {
    async fn save(&self, record: &ChatRecord) -> anyhow::Result<()> {
        let turns_json = serde_json::to_string(&record.turns)?;
        let now = chrono::Utc::now().naive_utc();

        let existing = chats::Entity::find_by_id(record.id.clone())
            .one(&self.db)
            .await?;

        if let Some(model) = existing {
            chats::Entity::update(chats::ActiveModel {
                id: Set(model.id),
                title: Set(record.title.clone()),
                user_id: Set(record.user_id.clone()),
                path: Set(record.path.clone()),
                turns: Set(turns_json),
                created_at: Set(model.created_at),
                updated_at: Set(now),
            })
            .exec(&self.db)
            .await?;
        } else {
            chats::ActiveModel {
                id: Set(record.id.clone()),
                title: Set(record.title.clone()),
                user_id: Set(record.user_id.clone()),
                path: Set(record.path.clone()),
                turns: Set(turns_json),
                created_at: Set(record.created_at.naive_utc()),
                updated_at: Set(now),
            }
            .insert(&self.db)
            .await?;
        }

        debug!("Saved chat {} ({} turns)", record.id, record.turns.len());
        Ok(())
    }

    async fn load(&self, id: &str) -> anyhow::Result<Option<ChatRecord>> {
        chats::Entity::find_by_id(id.to_owned())
            .one(&self.db)
            .await?
            .map(into_record)
            .transpose()
    }

    async fn list(&self, user_id: &str) -> anyhow::Result<Vec<ChatSummary>> {
        let models = chats::Entity::find()
            .filter(chats::Column::UserId.eq(user_id))
            .order_by_desc(chats::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(models
            .into_iter()
            .map(|m| ChatSummary {
                id: m.id,
                title: m.title,
                created_at: m.created_at.and_utc(),
            })
            .collect())
    }

    async fn remove(&self, id: &str) -> anyhow::Result<()> {
        chats::Entity::delete_by_id(id.to_owned())
            .exec(&self.db)
            .await?;

        info!("Removed chat: {}", id);
        Ok(())
    }
}
