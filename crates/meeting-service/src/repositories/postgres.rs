//! Postgres meeting store.
//!
//! One row per meeting; the roster is a JSONB array embedded in the row so a
//! meeting reads and writes as a single document.
//!
//! # Concurrency
//!
//! Participant append is a single conditional `UPDATE` whose `WHERE` clause
//! rejects a roster that already contains the name. Postgres takes the row
//! lock and re-evaluates the predicate against the latest row version, so
//! two concurrent joins with the same name cannot both succeed.

use super::{AppendOutcome, MeetingStore, StoreError};
use crate::models::{Meeting, Participant};
use crate::observability::metrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Server-side statement timeout applied to every pooled connection.
const STATEMENT_TIMEOUT_SECS: u32 = 5;

/// Durable `MeetingStore` backed by Postgres.
#[derive(Clone)]
pub struct PgMeetingStore {
    pool: PgPool,
}

impl PgMeetingStore {
    /// Wrap an existing pool (e.g. one provided by `#[sqlx::test]`).
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool with bounded acquire and statement timeouts.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = add_statement_timeout(database_url, STATEMENT_TIMEOUT_SECS);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&url)
            .await?;

        Ok(Self { pool })
    }

    /// Apply pending migrations from the workspace `migrations/` directory.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl MeetingStore for PgMeetingStore {
    #[instrument(skip_all, name = "meeting.repo.insert", fields(meeting_id = %meeting.meeting_id))]
    async fn insert(&self, meeting: &Meeting) -> Result<(), StoreError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            INSERT INTO meetings (meeting_id, name, participants, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&meeting.meeting_id)
        .bind(&meeting.name)
        .bind(Json(&meeting.participants))
        .bind(meeting.created_at)
        .execute(&self.pool)
        .await;

        let duration = start.elapsed();
        match result {
            Ok(_) => {
                metrics::record_store_query("insert", "success", duration);
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                metrics::record_store_query("insert", "conflict", duration);
                Err(StoreError::DuplicateMeetingId(meeting.meeting_id.clone()))
            }
            Err(e) => {
                metrics::record_store_query("insert", "error", duration);
                Err(StoreError::Backend(e.to_string()))
            }
        }
    }

    #[instrument(skip_all, name = "meeting.repo.find", fields(meeting_id = %meeting_id))]
    async fn find_by_meeting_id(&self, meeting_id: &str) -> Result<Option<Meeting>, StoreError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            SELECT meeting_id, name, participants, created_at
            FROM meetings
            WHERE meeting_id = $1
            "#,
        )
        .bind(meeting_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_store_query("find", "error", start.elapsed());
            StoreError::Backend(e.to_string())
        })?;

        metrics::record_store_query("find", "success", start.elapsed());

        row.map(map_row_to_meeting).transpose()
    }

    #[instrument(skip_all, name = "meeting.repo.append_participant", fields(meeting_id = %meeting_id))]
    async fn append_participant(
        &self,
        meeting_id: &str,
        participant: &Participant,
    ) -> Result<AppendOutcome, StoreError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            UPDATE meetings
            SET participants = participants || jsonb_build_array($2::jsonb)
            WHERE meeting_id = $1
              AND NOT participants @> jsonb_build_array(jsonb_build_object('name', $3::text))
            RETURNING meeting_id, name, participants, created_at
            "#,
        )
        .bind(meeting_id)
        .bind(Json(participant))
        .bind(&participant.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_store_query("append_participant", "error", start.elapsed());
            StoreError::Backend(e.to_string())
        })?;

        if let Some(row) = row {
            metrics::record_store_query("append_participant", "success", start.elapsed());
            return map_row_to_meeting(row).map(AppendOutcome::Appended);
        }

        // No row updated: either the meeting is missing or the name is taken.
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM meetings WHERE meeting_id = $1)")
                .bind(meeting_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    metrics::record_store_query("append_participant", "error", start.elapsed());
                    StoreError::Backend(e.to_string())
                })?;

        metrics::record_store_query("append_participant", "rejected", start.elapsed());

        Ok(if exists {
            AppendOutcome::DuplicateName
        } else {
            AppendOutcome::MeetingNotFound
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

/// Map a `meetings` row to a `Meeting`.
fn map_row_to_meeting(row: PgRow) -> Result<Meeting, StoreError> {
    let decode = |e: sqlx::Error| StoreError::Corrupt(e.to_string());

    let Json(participants): Json<Vec<Participant>> =
        row.try_get("participants").map_err(decode)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;

    Ok(Meeting {
        name: row.try_get("name").map_err(decode)?,
        meeting_id: row.try_get("meeting_id").map_err(decode)?,
        participants,
        created_at,
    })
}

/// Adds statement_timeout to the database URL.
fn add_statement_timeout(url: &str, timeout_secs: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}options=-c%20statement_timeout%3D{}s",
        url, separator, timeout_secs
    )
}
