// Karma - Agent Trust Scoring
// Copyright (C) 2025 Karma Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Connection handling and store-wide queries.

use eyre::{Result, WrapErr};
use sqlx::{
    pool::PoolConnection,
    postgres::{PgPool, PgPoolOptions},
    Postgres,
};
use std::time::Duration;
use tracing::info;

/// Handle to the Karma database.
///
/// Cheap to clone; all components receive the same pool. The embedded
/// migrations run on connect, so a fresh database is usable immediately.
#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connect to Postgres and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .wrap_err("failed to connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .wrap_err("failed to run database migrations")?;

        info!("Connected to database, schema is current");
        Ok(Self { pool })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Size of the current database in bytes, for run summaries.
    pub async fn database_size(&self) -> Result<i64> {
        let (size,): (i64,) =
            sqlx::query_as("SELECT pg_database_size(current_database())")
                .fetch_one(&self.pool)
                .await?;
        Ok(size)
    }

    /// Total number of tracked wallets.
    pub async fn wallet_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wallets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Try to take the process-exclusive scoring lock.
    ///
    /// Returns `None` when another scoring run holds it. Advisory locks
    /// are scoped to the backend session that takes them, so the returned
    /// guard pins one pooled connection for the lock's lifetime; the
    /// unlock must run on that same session.
    pub async fn try_scoring_lock(&self) -> Result<Option<ScoringLock>> {
        let mut conn = self.pool.acquire().await?;
        let (locked,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
            .bind(SCORING_LOCK_KEY)
            .fetch_one(&mut *conn)
            .await?;
        Ok(locked.then(|| ScoringLock { conn: Some(conn) }))
    }
}

/// Holds the process-exclusive scoring lock on one pinned connection.
///
/// [`ScoringLock::release`] unlocks on the pinned session and hands the
/// connection back to the pool. Dropping the guard without releasing
/// closes the pinned connection instead, which ends the session and the
/// lock with it; returning a still-locked connection to the pool would
/// wedge every later scoring run.
pub struct ScoringLock {
    conn: Option<PoolConnection<Postgres>>,
}

impl ScoringLock {
    /// Release the lock on the session that took it.
    pub async fn release(mut self) -> Result<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        let (released,): (bool,) = sqlx::query_as("SELECT pg_advisory_unlock($1)")
            .bind(SCORING_LOCK_KEY)
            .fetch_one(&mut *conn)
            .await?;
        if !released {
            eyre::bail!("scoring lock was not held by this session");
        }
        Ok(())
    }
}

impl Drop for ScoringLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(conn.detach());
        }
    }
}

// "KARM" in ASCII; any stable value works as long as every writer agrees.
const SCORING_LOCK_KEY: i64 = 0x4b41524d;
