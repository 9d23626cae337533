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
use time::{OffsetDateTime, Time};

use crate::error::{RankerError, Result};

mod schema;
use schema::daily_usage;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

/// One counter row per (user, calendar day). The count only moves forward.
#[derive(Debug, Clone)]
pub struct DailyUsage {
    pub id: i32,
    pub user_id: i32,
    pub day: i64,
    pub messages_count: i64,
}

impl DailyUsage {
    pub fn has_remaining(&self, cap: i64) -> bool {
        self.messages_count < cap
    }
}

#[derive(Queryable)]
struct UsageRow {
    id: i32,
    user_id: i32,
    day: i64,
    messages_count: i64,
}

#[derive(Insertable)]
#[diesel(table_name = daily_usage)]
struct NewUsage {
    user_id: i32,
    day: i64,
    messages_count: i64,
}

pub struct UsageStore {
    pool: SqlitePool,
}

impl UsageStore {
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

    /// Returns the counter row for (user, day), creating it at zero when
    /// absent. A concurrent creation of the same row loses the insert to the
    /// UNIQUE(user_id, day) constraint and falls through to the select, so
    /// callers always converge on a single row.
    pub async fn get_or_create(&self, user_id: i32, day: i64) -> Result<DailyUsage> {
        let new = NewUsage {
            user_id,
            day,
            messages_count: 0,
        };

        let mut conn = self.conn().await?;
        let inserted = diesel::insert_into(daily_usage::table)
            .values(&new)
            .execute(&mut conn)
            .await;
        match inserted {
            Ok(_) => {}
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {}
            Err(e) => return Err(RankerError::Runtime(e.to_string())),
        }

        let row: UsageRow = daily_usage::table
            .filter(daily_usage::user_id.eq(user_id))
            .filter(daily_usage::day.eq(day))
            .first(&mut conn)
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        Ok(map_row(row))
    }

    /// Single-statement increment; never decrements, never resets.
    pub async fn increment(&self, id: i32) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::update(daily_usage::table.filter(daily_usage::id.eq(id)))
            .set(daily_usage::messages_count.eq(daily_usage::messages_count + 1))
            .execute(&mut conn)
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        Ok(())
    }

    pub async fn count_for(&self, user_id: i32, day: i64) -> Result<i64> {
        let mut conn = self.conn().await?;
        let row: Option<UsageRow> = daily_usage::table
            .filter(daily_usage::user_id.eq(user_id))
            .filter(daily_usage::day.eq(day))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| RankerError::Runtime(e.to_string()))?;
        Ok(row.map(|r| r.messages_count).unwrap_or(0))
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| RankerError::Runtime(e.to_string()))
    }
}

/// Truncates a unix-millisecond timestamp to midnight UTC of its calendar day.
pub fn day_start(ts_ms: i64) -> i64 {
    let dt = OffsetDateTime::from_unix_timestamp(ts_ms.div_euclid(1000))
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    dt.replace_time(Time::MIDNIGHT).unix_timestamp() * 1000
}

pub fn today() -> i64 {
    day_start(now_ms())
}

fn map_row(row: UsageRow) -> DailyUsage {
    DailyUsage {
        id: row.id,
        user_id: row.user_id,
        day: row.day,
        messages_count: row.messages_count,
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
