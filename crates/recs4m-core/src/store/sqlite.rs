//! SQLite implementation of [`ReservationStore`] and [`ActivityLog`].
//!
//! Uses [`sqlx`] with the `sqlite` feature. Migrations are embedded at
//! compile time from `./migrations` (relative to `CARGO_MANIFEST_DIR`) and
//! applied by [`SqliteStore::connect`].
//!
//! Reservations are persisted as JSON documents so that a row written by an
//! older or foreign writer surfaces as [`StoreError::Decode`] on the next
//! listing instead of being silently skipped.

use std::str::FromStr;

use chrono::DateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use super::{ActivityLog, ReservationStore};
use crate::error::StoreError;
use crate::reservation::{LogEntry, Reservation};

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://recs4m.db"`
    /// or `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // Every connection to `:memory:` is its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }
}

fn decode_reservation(id: String, payload: &str) -> Result<Reservation, StoreError> {
    serde_json::from_str(payload).map_err(|source| StoreError::Decode { key: id, source })
}

impl ReservationStore for SqliteStore {
    async fn list_reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, payload FROM reservations ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|(id, payload)| decode_reservation(id, &payload))
            .collect()
    }

    async fn get_reservation(&self, id: &str) -> Result<Option<Reservation>, StoreError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, payload FROM reservations WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(id, payload)| decode_reservation(id, &payload)).transpose()
    }

    async fn put_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&reservation)?;
        sqlx::query(
            "INSERT INTO reservations (id, payload) VALUES (?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET payload = ?2",
        )
        .bind(&reservation.id)
        .bind(&payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_reservation(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM reservations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_reservations(&self, ids: &[String]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM reservations WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

impl ActivityLog for SqliteStore {
    async fn append_log(&self, entry: LogEntry) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO activity_log (logged_at, logged_ms, message) VALUES (?1, ?2, ?3)")
            .bind(entry.logged_at.to_rfc3339())
            .bind(entry.logged_at.timestamp_millis())
            .bind(&entry.message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_logs(&self) -> Result<Vec<LogEntry>, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT logged_at, message FROM activity_log ORDER BY logged_ms DESC, seq DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(logged_at, message)| -> Result<LogEntry, StoreError> {
                let parsed = DateTime::parse_from_rfc3339(&logged_at)
                    .map_err(|source| StoreError::Timestamp { raw: logged_at.clone(), source })?;
                Ok(LogEntry { logged_at: parsed, message })
            })
            .collect()
    }
}
