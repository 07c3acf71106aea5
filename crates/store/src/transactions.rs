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

//! Idempotent payment inserts.

use crate::{db::Store, models::NewTransaction};
use eyre::Result;

impl Store {
    /// Insert a payment row, keyed on `(tx_hash, chain)`.
    ///
    /// Returns `true` iff a row was actually written. Wallet mutations are
    /// tied to this return value so re-scanning a processed range is a
    /// complete no-op.
    pub async fn insert_transaction(&self, tx: &NewTransaction) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions
                (tx_hash, chain, block_number, authorizer, payer, recipient,
                 amount_raw, amount_usdc, facilitator, is_x402, block_timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (tx_hash, chain) DO NOTHING
            "#,
        )
        .bind(&tx.tx_hash)
        .bind(&tx.chain)
        .bind(tx.block_number)
        .bind(&tx.authorizer)
        .bind(&tx.payer)
        .bind(&tx.recipient)
        .bind(&tx.amount_raw)
        .bind(&tx.amount_usdc)
        .bind(&tx.facilitator)
        .bind(tx.is_x402)
        .bind(tx.block_timestamp)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
