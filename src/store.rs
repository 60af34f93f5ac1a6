use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::models::{AlertRecord, HistoryEntry, Listing, ListingStatus, ListingValue};
use crate::utils::error::Result;

const LISTING_COLUMNS: &str =
    "id, kind, title, category, url, value_json, status, first_seen_at, last_seen_at";

/// SQLite-backed persistence: current state, append-only history, and the
/// alert ledger. Overlapping runs against one store are a caller-side
/// hazard; see `run_lock`.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the on-disk store at `path`. Accepts a bare file
    /// path or a `sqlite://` URL.
    pub async fn open(path: &str) -> Result<Self> {
        let filename = path
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        if filename != ":memory:" {
            if let Some(parent) = std::path::Path::new(filename).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store for tests. Single connection: each sqlite :memory:
    /// connection is its own database.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS listings (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                category TEXT NOT NULL,
                url TEXT NOT NULL,
                value_json TEXT NOT NULL,
                status TEXT NOT NULL,
                first_seen_at TEXT NOT NULL,
                last_seen_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS listing_history (
                id TEXT PRIMARY KEY,
                listing_id TEXT NOT NULL,
                value_json TEXT NOT NULL,
                observed_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_history_listing
             ON listing_history (listing_id, observed_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS alert_ledger (
                id TEXT PRIMARY KEY,
                listing_id TEXT NOT NULL,
                signal_value REAL NOT NULL,
                reason TEXT NOT NULL,
                threshold REAL NOT NULL,
                triggered_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ledger_listing
             ON alert_ledger (listing_id, signal_value)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(listing)
    }

    /// Insert or replace the current state for a listing id, returning the
    /// previously stored row. Read and write happen in one transaction so
    /// the previous value is the one actually replaced. `first_seen_at` is
    /// preserved across updates.
    pub async fn upsert(&self, listing: &Listing) -> Result<Option<Listing>> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_as::<_, Listing>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?"
        ))
        .bind(&listing.id)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO listings
            (id, kind, title, category, url, value_json, status, first_seen_at, last_seen_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                title = excluded.title,
                category = excluded.category,
                url = excluded.url,
                value_json = excluded.value_json,
                status = excluded.status,
                last_seen_at = excluded.last_seen_at
            ",
        )
        .bind(&listing.id)
        .bind(listing.kind)
        .bind(&listing.title)
        .bind(&listing.category)
        .bind(&listing.url)
        .bind(&listing.value_json)
        .bind(listing.status)
        .bind(listing.first_seen_at)
        .bind(listing.last_seen_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(previous)
    }

    /// Refresh `last_seen_at` and `status` without touching the stored value.
    pub async fn touch(
        &self,
        id: &str,
        last_seen_at: DateTime<Utc>,
        status: ListingStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE listings SET last_seen_at = ?, status = ? WHERE id = ?")
            .bind(last_seen_at)
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_status(&self, id: &str, status: ListingStatus) -> Result<()> {
        sqlx::query("UPDATE listings SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn append_history(
        &self,
        listing_id: &str,
        value: &ListingValue,
        observed_at: DateTime<Utc>,
    ) -> Result<()> {
        let entry = HistoryEntry::new(listing_id.to_string(), value, observed_at)?;
        sqlx::query(
            "INSERT INTO listing_history (id, listing_id, value_json, observed_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.listing_id)
        .bind(&entry.value_json)
        .bind(entry.observed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn history(&self, listing_id: &str) -> Result<Vec<HistoryEntry>> {
        let entries = sqlx::query_as::<_, HistoryEntry>(
            "SELECT id, listing_id, value_json, observed_at FROM listing_history
             WHERE listing_id = ? ORDER BY observed_at",
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    pub async fn record_alert(&self, record: &AlertRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO alert_ledger (id, listing_id, signal_value, reason, threshold, triggered_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.listing_id)
        .bind(record.signal_value)
        .bind(record.reason)
        .bind(record.threshold)
        .bind(record.triggered_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// True when an alert for exactly this signal value has already been
    /// delivered for the listing. Keeps a repeated observation of the same
    /// state from notifying twice.
    pub async fn has_alerted(&self, listing_id: &str, signal_value: f64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM alert_ledger WHERE listing_id = ? AND signal_value = ?",
        )
        .bind(listing_id)
        .bind(signal_value)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn all_listings(&self) -> Result<Vec<Listing>> {
        let listings = sqlx::query_as::<_, Listing>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings ORDER BY category, title"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(listings)
    }
}
