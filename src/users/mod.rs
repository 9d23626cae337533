use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::{RankerError, Result};

mod schema;
use schema::users;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_SUSPENDED: &str = "suspended";

/// Full account row, password hash included. Only the auth gate should hold
/// on to this; everything else works with the sanitized identity it exposes.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub locale: String,
    pub created_at: i64,
}

#[derive(Queryable)]
struct UserRow {
    id: i32,
    email: String,
    password_hash: String,
    role: String,
    status: String,
    locale: String,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct NewUser<'a> {
    email: &'a str,
    password_hash: &'a str,
    role: &'a str,
    status: &'a str,
    locale: &'a str,
    created_at: i64,
}

pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
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

    pub async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        role: &str,
        status: &str,
        locale: &str,
    ) -> Result<UserRecord> {
        let new = NewUser {
            email,
            password_hash,
            role,
            status,
            locale,
            created_at: now_ms(),
        };

        let mut conn = self.conn().await?;
        diesel::insert_into(users::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    RankerError::Validation("email already registered".to_string())
                }
                other => RankerError::Runtime(other.to_string()),
            })?;

        let row: UserRow = users::table
            .filter(users::email.eq(email))
            .first(&mut conn)
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        Ok(map_row(row))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let mut conn = self.conn().await?;
        let row: Option<UserRow> = users::table
            .filter(users::email.eq(email))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        Ok(row.map(map_row))
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<UserRecord>> {
        let mut conn = self.conn().await?;
        let row: Option<UserRow> = users::table
            .filter(users::id.eq(id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        Ok(row.map(map_row))
    }

    pub async fn set_status(&self, id: i32, status: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let count = diesel::update(users::table.filter(users::id.eq(id)))
            .set(users::status.eq(status))
            .execute(&mut conn)
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        if count == 0 {
            return Err(RankerError::NotFound("user not found".to_string()));
        }
        Ok(())
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))
    }
}

fn map_row(row: UserRow) -> UserRecord {
    UserRecord {
        id: row.id,
        email: row.email,
        password_hash: row.password_hash,
        role: row.role,
        status: row.status,
        locale: row.locale,
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
