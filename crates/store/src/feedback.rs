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

//! Idempotent feedback inserts.

use crate::{
    db::Store,
    models::{FeedbackSource, NewFeedback},
};
use eyre::Result;

impl Store {
    /// Insert a feedback attestation, keyed on `(tx_hash, feedback_index)`.
    ///
    /// Returns `true` iff a row was actually written. Feedback never
    /// mutates wallets directly; it joins through `wallets.erc8004_id` at
    /// aggregation time.
    pub async fn insert_feedback(&self, fb: &NewFeedback) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO feedback
                (tx_hash, feedback_index, agent_id, client_address, value, value_decimals,
                 tag1, tag2, endpoint, feedback_uri, content_hash,
                 block_number, block_timestamp, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (tx_hash, feedback_index) DO NOTHING
            "#,
        )
        .bind(&fb.tx_hash)
        .bind(fb.feedback_index)
        .bind(fb.agent_id)
        .bind(&fb.client_address)
        .bind(&fb.value)
        .bind(fb.value_decimals)
        .bind(&fb.tag1)
        .bind(&fb.tag2)
        .bind(&fb.endpoint)
        .bind(&fb.feedback_uri)
        .bind(&fb.content_hash)
        .bind(fb.block_number)
        .bind(fb.block_timestamp)
        .bind(FeedbackSource::Chain.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
