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

//! Score persistence: snapshot history plus the wallet's scoring columns.

use crate::{db::Store, models::Role};
use eyre::Result;

impl Store {
    /// Persist one scored wallet.
    ///
    /// The snapshot insert and the wallet update run in one transaction,
    /// snapshot first, so `score_history` never misses a score the wallet
    /// row carries.
    pub async fn persist_score(
        &self,
        address: &str,
        score: i32,
        breakdown: &serde_json::Value,
        role: Option<Role>,
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO score_history (address, score, breakdown, computed_at) \
             VALUES ($1, $2, $3, now())",
        )
        .bind(address)
        .bind(score)
        .bind(breakdown)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE wallets SET
                trust_score = $2,
                score_breakdown = $3,
                scored_at = now(),
                role = $4,
                needs_rescore = FALSE
            WHERE address = $1
            "#,
        )
        .bind(address)
        .bind(score)
        .bind(breakdown)
        .bind(role.map(|r| r.as_str()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Number of snapshots recorded for one wallet.
    pub async fn snapshot_count(&self, address: &str) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM score_history WHERE address = $1")
                .bind(address)
                .fetch_one(self.pool())
                .await?;
        Ok(count)
    }
}
