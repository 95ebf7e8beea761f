//! Persistence gateway: idempotent event upserts keyed by NaturalKey and
//! atomic per-scope stat-line replacement.

use std::collections::HashMap;

use async_trait::async_trait;
use pitchsync_core::{MatchEvent, NaturalKey, PlayerStatLine, ScopeId};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

pub const CRATE_NAME: &str = "pitchsync-store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistence conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Unique violations and serialization failures are the conflict class
    /// the pipeline retries once.
    pub fn is_conflict(&self) -> bool {
        match self {
            StoreError::Conflict(_) => true,
            StoreError::Database(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("23505") | Some("40001"))
            }
            _ => false,
        }
    }
}

/// Write and read surface the pipeline consumes. Atomicity of
/// `replace_stat_lines` (delete-then-insert as one transaction) is the
/// store's responsibility.
#[async_trait]
pub trait StatStore: Send + Sync {
    /// Insert events not yet present, keyed by NaturalKey. Existing rows
    /// are left untouched; returns the number of rows actually inserted.
    async fn upsert_events(&self, events: &[MatchEvent]) -> Result<u64, StoreError>;

    /// Replace every stat line in the scope with `rows`. Never a partial
    /// update: stale rows from removed events must not survive.
    async fn replace_stat_lines(
        &self,
        scope: &ScopeId,
        rows: &[PlayerStatLine],
    ) -> Result<u64, StoreError>;

    /// Superseding reimport: drop every stored event for a match so a fresh
    /// fetch can reinsert it whole.
    async fn delete_match_events(&self, match_id: &str) -> Result<u64, StoreError>;

    /// Persisted stat lines for one scope, ordered by player id.
    async fn stat_lines(&self, scope: &ScopeId) -> Result<Vec<PlayerStatLine>, StoreError>;
}

/// Postgres-backed store.
pub struct PgStatStore {
    pool: PgPool,
}

impl PgStatStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn insert_event(
        tx: &mut Transaction<'_, Postgres>,
        event: &MatchEvent,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO match_events (
                match_id, competition_id, season, minute, minute_extra,
                event_type, detail, team_id, player_id, player_name,
                assist_player_id, assist_player_name, source_id,
                source_record_id, ingested_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (
                match_id, COALESCE(player_id, ''), event_type, minute,
                COALESCE(minute_extra, -1), COALESCE(detail, '')
            ) DO NOTHING
            "#,
        )
        .bind(&event.match_id)
        .bind(&event.scope.competition_id)
        .bind(&event.scope.season)
        .bind(i32::from(event.minute))
        .bind(event.minute_extra.map(i32::from))
        .bind(event.event_type.to_string())
        .bind(&event.detail)
        .bind(&event.team_id)
        .bind(&event.player_id)
        .bind(&event.player_name)
        .bind(&event.assist_player_id)
        .bind(&event.assist_player_name)
        .bind(&event.source_id)
        .bind(&event.source_record_id)
        .bind(event.ingested_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl StatStore for PgStatStore {
    async fn upsert_events(&self, events: &[MatchEvent]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for event in events {
            inserted += Self::insert_event(&mut tx, event).await?;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn replace_stat_lines(
        &self,
        scope: &ScopeId,
        rows: &[PlayerStatLine],
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM player_stat_lines WHERE competition_id = $1 AND season = $2")
            .bind(&scope.competition_id)
            .bind(&scope.season)
            .execute(&mut *tx)
            .await?;

        let mut written = 0u64;
        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO player_stat_lines (
                    player_id, player_name, competition_id, season,
                    goals, assists, yellow_cards, red_cards, appearances
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(&row.player_id)
            .bind(&row.player_name)
            .bind(&row.scope.competition_id)
            .bind(&row.scope.season)
            .bind(row.goals as i32)
            .bind(row.assists as i32)
            .bind(row.yellow_cards as i32)
            .bind(row.red_cards as i32)
            .bind(row.appearances as i32)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn delete_match_events(&self, match_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM match_events WHERE match_id = $1")
            .bind(match_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn stat_lines(&self, scope: &ScopeId) -> Result<Vec<PlayerStatLine>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT player_id, player_name, goals, assists,
                   yellow_cards, red_cards, appearances
            FROM player_stat_lines
            WHERE competition_id = $1 AND season = $2
            ORDER BY player_id
            "#,
        )
        .bind(&scope.competition_id)
        .bind(&scope.season)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PlayerStatLine {
                player_id: row.get("player_id"),
                player_name: row.get("player_name"),
                scope: scope.clone(),
                goals: row.get::<i32, _>("goals") as u32,
                assists: row.get::<i32, _>("assists") as u32,
                yellow_cards: row.get::<i32, _>("yellow_cards") as u32,
                red_cards: row.get::<i32, _>("red_cards") as u32,
                appearances: row.get::<i32, _>("appearances") as u32,
            })
            .collect())
    }
}

/// Retry-once wrapper for the conflict class: a concurrent scope colliding
/// on an upsert usually succeeds on the second attempt; if it recurs, the
/// scope fails loudly.
pub async fn upsert_events_with_retry(
    store: &dyn StatStore,
    events: &[MatchEvent],
) -> Result<u64, StoreError> {
    match store.upsert_events(events).await {
        Ok(inserted) => Ok(inserted),
        Err(err) if err.is_conflict() => {
            warn!(error = %err, "event upsert hit a conflict, retrying once");
            store.upsert_events(events).await
        }
        Err(err) => Err(err),
    }
}

/// In-memory store used by pipeline tests and dry runs. Mirrors the
/// Postgres semantics: first writer wins per NaturalKey, scope replacement
/// is all-or-nothing.
#[derive(Default)]
pub struct MemoryStatStore {
    events: Mutex<HashMap<NaturalKey, MatchEvent>>,
    stat_lines: Mutex<Vec<PlayerStatLine>>,
}

impl MemoryStatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<MatchEvent> {
        let mut events: Vec<_> = self.events.lock().await.values().cloned().collect();
        events.sort_by_key(|e| e.natural_key());
        events
    }

    pub async fn all_stat_lines(&self) -> Vec<PlayerStatLine> {
        self.stat_lines.lock().await.clone()
    }
}

#[async_trait]
impl StatStore for MemoryStatStore {
    async fn upsert_events(&self, events: &[MatchEvent]) -> Result<u64, StoreError> {
        let mut stored = self.events.lock().await;
        let mut inserted = 0u64;
        for event in events {
            let key = event.natural_key();
            if !stored.contains_key(&key) {
                stored.insert(key, event.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn replace_stat_lines(
        &self,
        scope: &ScopeId,
        rows: &[PlayerStatLine],
    ) -> Result<u64, StoreError> {
        let mut stored = self.stat_lines.lock().await;
        stored.retain(|line| line.scope != *scope);
        stored.extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }

    async fn delete_match_events(&self, match_id: &str) -> Result<u64, StoreError> {
        let mut stored = self.events.lock().await;
        let before = stored.len();
        stored.retain(|key, _| key.match_id != match_id);
        Ok((before - stored.len()) as u64)
    }

    async fn stat_lines(&self, scope: &ScopeId) -> Result<Vec<PlayerStatLine>, StoreError> {
        let mut lines: Vec<_> = self
            .stat_lines
            .lock()
            .await
            .iter()
            .filter(|line| line.scope == *scope)
            .cloned()
            .collect();
        lines.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        Ok(lines)
    }
}
