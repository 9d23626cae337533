use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde::Serialize;

use crate::error::{RankerError, Result};

mod schema;
use schema::{conversations, messages};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

pub const DEFAULT_TITLE: &str = "Nova Análise";
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i32,
    pub conversation_id: i32,
    pub role: String,
    pub content: String,
    pub created_at: i64,
}

#[derive(Queryable)]
struct ConversationRow {
    id: i32,
    user_id: i32,
    title: String,
    created_at: i64,
    updated_at: i64,
}

#[derive(Queryable)]
struct MessageRow {
    id: i32,
    conversation_id: i32,
    role: String,
    content: String,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = conversations)]
struct NewConversation<'a> {
    user_id: i32,
    title: &'a str,
    created_at: i64,
    updated_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = messages)]
struct NewMessage<'a> {
    conversation_id: i32,
    role: &'a str,
    content: &'a str,
    created_at: i64,
}

pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn create(&self, user_id: i32, title: Option<&str>) -> Result<Conversation> {
        let now = now_ms();
        let title = match title.map(str::trim) {
            Some(title) if !title.is_empty() => title,
            _ => DEFAULT_TITLE,
        };
        let new = NewConversation {
            user_id,
            title,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.conn().await?;
        diesel::insert_into(conversations::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))?;

        let row: ConversationRow = conversations::table
            .filter(conversations::user_id.eq(user_id))
            .order(conversations::id.desc())
            .first(&mut conn)
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        Ok(map_conversation(row))
    }

    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<Conversation>> {
        let mut conn = self.conn().await?;
        let rows: Vec<ConversationRow> = conversations::table
            .filter(conversations::user_id.eq(user_id))
            .order((conversations::updated_at.desc(), conversations::id.desc()))
            .load(&mut conn)
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        Ok(rows.into_iter().map(map_conversation).collect())
    }

    /// Resolves a conversation only when it belongs to `user_id`. Missing and
    /// foreign conversations are indistinguishable to the caller.
    pub async fn find_owned(&self, conversation_id: i32, user_id: i32) -> Result<Conversation> {
        let mut conn = self.conn().await?;
        let row: Option<ConversationRow> = conversations::table
            .filter(conversations::id.eq(conversation_id))
            .filter(conversations::user_id.eq(user_id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        row.map(map_conversation)
            .ok_or_else(|| RankerError::NotFound("conversation not found".to_string()))
    }

    pub async fn list_messages(&self, conversation_id: i32, user_id: i32) -> Result<Vec<Message>> {
        self.find_owned(conversation_id, user_id).await?;

        let mut conn = self.conn().await?;
        let rows: Vec<MessageRow> = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .order((messages::created_at.asc(), messages::id.asc()))
            .load(&mut conn)
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        Ok(rows.into_iter().map(map_message).collect())
    }

    pub async fn append_message(
        &self,
        conversation_id: i32,
        role: &str,
        content: &str,
    ) -> Result<Message> {
        let new = NewMessage {
            conversation_id,
            role,
            content,
            created_at: now_ms(),
        };

        let mut conn = self.conn().await?;
        diesel::insert_into(messages::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))?;

        let row: MessageRow = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .order(messages::id.desc())
            .first(&mut conn)
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        Ok(map_message(row))
    }

    pub async fn touch(&self, conversation_id: i32) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::update(conversations::table.filter(conversations::id.eq(conversation_id)))
            .set(conversations::updated_at.eq(now_ms()))
            .execute(&mut conn)
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        Ok(())
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))
    }
}

fn map_conversation(row: ConversationRow) -> Conversation {
    Conversation {
        id: row.id,
        user_id: row.user_id,
        title: row.title,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn map_message(row: MessageRow) -> Message {
    Message {
        id: row.id,
        conversation_id: row.conversation_id,
        role: row.role,
        content: row.content,
        created_at: row.created_at,
    }
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| RankerError::Runtime(e.to_string()))?;
    }
    Ok(())
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        Ok::<_, RankerError>(())
    })
    .await
    .map_err(|e| RankerError::Runtime(e.to_string()))??;
    Ok(())
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
