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

//! Wallet upserts and scoring selection.
//!
//! The two upserts encode the source-promotion rule: a wallet seen under
//! one event family flips to `both` the moment the other family observes
//! it, and never transitions back. `first_seen_at` is written once;
//! `last_seen_at` only moves forward.

use crate::{db::Store, models::WalletRow};
use chrono::{DateTime, Utc};
use eyre::Result;

impl Store {
    /// Record an identity-registry observation of `address`.
    ///
    /// Creates the wallet with `source = erc8004` or promotes an existing
    /// `x402` wallet to `both`. The earliest `erc8004_id` wins; later
    /// mints for the same owner do not overwrite it.
    pub async fn upsert_identity_wallet(
        &self,
        address: &str,
        chain: &str,
        erc8004_id: i64,
        seen_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets
                (address, source, chain, erc8004_id, tx_count, first_seen_at, last_seen_at, needs_rescore)
            VALUES ($1, 'erc8004', $2, $3, 0, $4, $4, TRUE)
            ON CONFLICT (address) DO UPDATE SET
                source = CASE WHEN wallets.source = 'x402' THEN 'both' ELSE wallets.source END,
                erc8004_id = COALESCE(wallets.erc8004_id, EXCLUDED.erc8004_id),
                last_seen_at = GREATEST(wallets.last_seen_at, EXCLUDED.last_seen_at),
                needs_rescore = TRUE
            "#,
        )
        .bind(address)
        .bind(chain)
        .bind(erc8004_id)
        .bind(seen_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Record a payment observation of `address`, bumping `tx_count`.
    ///
    /// Creates the wallet with `source = x402` or promotes an existing
    /// `erc8004` wallet to `both`.
    pub async fn upsert_payment_wallet(
        &self,
        address: &str,
        chain: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets
                (address, source, chain, tx_count, first_seen_at, last_seen_at, needs_rescore)
            VALUES ($1, 'x402', $2, 1, $3, $3, TRUE)
            ON CONFLICT (address) DO UPDATE SET
                source = CASE WHEN wallets.source = 'erc8004' THEN 'both' ELSE wallets.source END,
                tx_count = wallets.tx_count + 1,
                last_seen_at = GREATEST(wallets.last_seen_at, EXCLUDED.last_seen_at),
                needs_rescore = TRUE
            "#,
        )
        .bind(address)
        .bind(chain)
        .bind(seen_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Wallets selected for a scoring pass: every wallet in `full` mode,
    /// otherwise only dirty ones.
    pub async fn wallets_for_scoring(&self, full: bool) -> Result<Vec<WalletRow>> {
        let query = if full {
            "SELECT * FROM wallets ORDER BY address"
        } else {
            "SELECT * FROM wallets WHERE needs_rescore ORDER BY address"
        };
        Ok(sqlx::query_as::<_, WalletRow>(query).fetch_all(self.pool()).await?)
    }
}
