//! SQLite-backed warning table.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::FromRow;

use crate::errors::{RelayError, RelayResult};
use crate::model::{Polygon, Warning};
use crate::store::queries;

/// Durable table of warnings keyed by id.
#[derive(Debug, Clone)]
pub struct WarningStore {
    pool: SqlitePool,
}

impl WarningStore {
    /// Open (creating if missing) the database and apply the schema.
    ///
    /// WAL journaling with full synchronous commits: a successful write
    /// survives a crash immediately after return.
    pub async fn connect(url: &str, max_connections: u32) -> RelayResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        for ddl in [
            queries::CREATE_WARNINGS_TABLE,
            queries::CREATE_ISSUE_DATE_INDEX,
            queries::CREATE_ACTIVE_INDEX,
        ] {
            sqlx::query(ddl).execute(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Idempotent write-through; replaces any row with the same id.
    ///
    /// `created_at` is written on first insert only, so the row keeps
    /// its original first-persistence timestamp across reissues.
    pub async fn upsert(&self, warning: &Warning) -> RelayResult<()> {
        sqlx::query(queries::UPSERT_WARNING)
            .bind(&warning.id)
            .bind(&warning.kind)
            .bind(encode_polygon(&warning.polygon)?)
            .bind(encode_ts(warning.issued_at))
            .bind(warning.duration_minutes)
            .bind(encode_ts(warning.expires_at))
            .bind(&warning.wind)
            .bind(&warning.hail)
            .bind(&warning.threat)
            .bind(&warning.author)
            .bind(&warning.info)
            .bind(&warning.possible_tag)
            .bind(warning.active)
            .bind(encode_ts(warning.created_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Set `active = false` for the row with this id; no-op if absent.
    ///
    /// Returns whether a row actually transitioned, so callers can keep
    /// expiry announcements to one per activation episode.
    pub async fn mark_inactive(&self, id: &str) -> RelayResult<bool> {
        let result = sqlx::query(queries::MARK_INACTIVE)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All rows with `active = true` and `expires_at > now`, ordered by
    /// issue time. Used at startup reconciliation and on subscriber
    /// bootstrap.
    pub async fn list_active(&self, now: DateTime<Utc>) -> RelayResult<Vec<Warning>> {
        let rows: Vec<WarningRow> = sqlx::query_as(queries::SELECT_ACTIVE)
            .bind(encode_ts(now))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Warning::try_from).collect()
    }

    /// All rows whose `issued_at` falls on the given calendar date,
    /// ordered by issue time ascending.
    pub async fn list_by_issue_date(&self, date: NaiveDate) -> RelayResult<Vec<Warning>> {
        let rows: Vec<WarningRow> = sqlx::query_as(queries::SELECT_BY_ISSUE_DATE)
            .bind(date.format("%Y-%m-%d").to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Warning::try_from).collect()
    }
}

/// Raw row shape; timestamps and geometry stay TEXT until decoded.
#[derive(Debug, FromRow)]
struct WarningRow {
    id: String,
    kind: String,
    polygon: String,
    issued_at: String,
    duration_minutes: i64,
    expires_at: String,
    wind: Option<String>,
    hail: Option<String>,
    threat: Option<String>,
    author: Option<String>,
    info: Option<String>,
    possible_tag: Option<String>,
    active: bool,
    created_at: String,
}

impl TryFrom<WarningRow> for Warning {
    type Error = RelayError;

    fn try_from(row: WarningRow) -> Result<Self, Self::Error> {
        Ok(Warning {
            id: row.id,
            kind: row.kind,
            polygon: decode_polygon(&row.polygon)?,
            issued_at: decode_ts(&row.issued_at)?,
            duration_minutes: row.duration_minutes,
            expires_at: decode_ts(&row.expires_at)?,
            wind: row.wind,
            hail: row.hail,
            threat: row.threat,
            author: row.author,
            info: row.info,
            possible_tag: row.possible_tag,
            active: row.active,
            created_at: decode_ts(&row.created_at)?,
        })
    }
}

/// Fixed-width RFC 3339 UTC ("2024-05-01T12:30:00.000Z"): text order
/// equals time order, and `substr(_, 1, 10)` is the calendar date.
fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn decode_ts(raw: &str) -> RelayResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RelayError::Persistence(sqlx::Error::Decode(Box::new(e))))
}

fn encode_polygon(polygon: &Polygon) -> RelayResult<String> {
    serde_json::to_string(polygon)
        .map_err(|e| RelayError::Persistence(sqlx::Error::Decode(Box::new(e))))
}

fn decode_polygon(raw: &str) -> RelayResult<Polygon> {
    serde_json::from_str(raw).map_err(|e| RelayError::Persistence(sqlx::Error::Decode(Box::new(e))))
}
