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

//! Scanner cursor persistence.
//!
//! One row per scanner id. `last_block` is inclusive: the next scan starts
//! at `last_block + 1`. The GREATEST guard keeps the cursor monotone even
//! if a stale commit ever races a fresh one.

use crate::db::Store;
use eyre::Result;

impl Store {
    /// The last committed block for `scanner_id`, if the scanner has run.
    pub async fn cursor(&self, scanner_id: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT last_block FROM indexer_state WHERE scanner_id = $1")
                .bind(scanner_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(|(last_block,)| last_block))
    }

    /// Advance the cursor to `last_block`.
    pub async fn commit_cursor(&self, scanner_id: &str, last_block: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO indexer_state (scanner_id, last_block, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (scanner_id) DO UPDATE SET
                last_block = GREATEST(indexer_state.last_block, EXCLUDED.last_block),
                updated_at = now()
            "#,
        )
        .bind(scanner_id)
        .bind(last_block)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
