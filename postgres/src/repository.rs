use lucky_draw_core::persistence::{
    EntryRow, EventRepository, EventRow, PersistenceError, RepositoryFuture, RowSet,
};
use lucky_draw_core::types::EventSet;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::{Duration, Instant};

/// `PostgreSQL`-backed event repository.
#[derive(Clone, Debug)]
pub struct PostgresEventRepository {
    pool: PgPool,
}

impl PostgresEventRepository {
    /// Connect with default pool settings.
    ///
    /// # Errors
    ///
    /// `Storage` if the database is unreachable.
    pub async fn new(database_url: &str) -> Result<Self, PersistenceError> {
        Self::connect(database_url, 5, Duration::from_secs(30)).await
    }

    /// Connect with explicit pool size and acquire timeout.
    ///
    /// # Errors
    ///
    /// `Storage` if the database is unreachable.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| PersistenceError::Storage(format!("Failed to connect: {e}")))?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema migrations in `postgres/migrations`.
    ///
    /// # Errors
    ///
    /// `Storage` if a migration fails.
    pub async fn migrate(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PersistenceError::Storage(format!("Migration failed: {e}")))?;
        tracing::info!("Lucky draw schema ready");
        Ok(())
    }

    async fn load_rows(&self) -> Result<RowSet, PersistenceError> {
        let events: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT name, creator_id, num_winners FROM lucky_events ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::Storage(format!("Failed to load events: {e}")))?;

        let entries: Vec<(String, i64, String, String)> = sqlx::query_as(
            "SELECT event_name, number, participant_id, display_name
             FROM lucky_entries
             ORDER BY event_name, number",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::Storage(format!("Failed to load entries: {e}")))?;

        let events = events
            .into_iter()
            .map(|(name, creator_id, num_winners)| {
                let num_winners = u32::try_from(num_winners).map_err(|_| {
                    PersistenceError::Corrupt(format!(
                        "event {name} has invalid num_winners {num_winners}"
                    ))
                })?;
                Ok(EventRow {
                    name,
                    creator_id,
                    num_winners,
                })
            })
            .collect::<Result<Vec<_>, PersistenceError>>()?;

        let entries = entries
            .into_iter()
            .map(|(event_name, number, participant_id, display_name)| {
                let number = u32::try_from(number).map_err(|_| {
                    PersistenceError::Corrupt(format!(
                        "event {event_name} has invalid number {number}"
                    ))
                })?;
                Ok(EntryRow {
                    event_name,
                    number,
                    participant_id,
                    display_name,
                })
            })
            .collect::<Result<Vec<_>, PersistenceError>>()?;

        Ok(RowSet { events, entries })
    }

    async fn reconcile(&self, rows: RowSet) -> Result<(), sqlx::Error> {
        let event_names: Vec<String> = rows.events.iter().map(|r| r.name.clone()).collect();
        let creators: Vec<String> = rows.events.iter().map(|r| r.creator_id.clone()).collect();
        let winners: Vec<i64> = rows.events.iter().map(|r| i64::from(r.num_winners)).collect();

        let entry_events: Vec<String> = rows.entries.iter().map(|r| r.event_name.clone()).collect();
        let numbers: Vec<i64> = rows.entries.iter().map(|r| i64::from(r.number)).collect();
        let participants: Vec<String> =
            rows.entries.iter().map(|r| r.participant_id.clone()).collect();
        let display_names: Vec<String> =
            rows.entries.iter().map(|r| r.display_name.clone()).collect();

        let mut tx = self.pool.begin().await?;

        // Events that are no longer live; entry rows go with them via cascade.
        let removed = sqlx::query("DELETE FROM lucky_events WHERE NOT (name = ANY($1))")
            .bind(&event_names)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query(
            "INSERT INTO lucky_events (name, creator_id, num_winners)
             SELECT * FROM UNNEST($1::text[], $2::text[], $3::bigint[])
             ON CONFLICT (name) DO UPDATE
             SET creator_id = EXCLUDED.creator_id,
                 num_winners = EXCLUDED.num_winners,
                 updated_at = now()",
        )
        .bind(&event_names)
        .bind(&creators)
        .bind(&winners)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM lucky_entries e
             WHERE NOT EXISTS (
                 SELECT 1 FROM UNNEST($1::text[], $2::bigint[]) AS k (event_name, number)
                 WHERE k.event_name = e.event_name AND k.number = e.number
             )",
        )
        .bind(&entry_events)
        .bind(&numbers)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO lucky_entries (event_name, number, participant_id, display_name)
             SELECT * FROM UNNEST($1::text[], $2::bigint[], $3::text[], $4::text[])
             ON CONFLICT (event_name, number) DO UPDATE
             SET participant_id = EXCLUDED.participant_id,
                 display_name = EXCLUDED.display_name",
        )
        .bind(&entry_events)
        .bind(&numbers)
        .bind(&participants)
        .bind(&display_names)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            events = event_names.len(),
            entries = numbers.len(),
            removed_events = removed,
            "Relational state reconciled"
        );
        Ok(())
    }
}

impl EventRepository for PostgresEventRepository {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    fn load(&self) -> RepositoryFuture<'_, EventSet> {
        Box::pin(async move {
            let rows = self.load_rows().await?;
            let events = rows.into_events()?;
            tracing::debug!(events = events.len(), "Events loaded from postgres");
            Ok(events)
        })
    }

    fn save<'a>(&'a self, events: &'a EventSet) -> RepositoryFuture<'a, ()> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.reconcile(RowSet::from_events(events)).await;

            metrics::histogram!("lucky_draw.persistence.save_duration_seconds", "backend" => "postgres")
                .record(started.elapsed().as_secs_f64());

            result.map_err(|e| PersistenceError::Storage(format!("Failed to save events: {e}")))
        })
    }
}
