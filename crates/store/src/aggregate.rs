//! Set-oriented signal aggregation.
//!
//! One pass over the event store yields four per-wallet maps that the
//! scoring engine consumes in memory. Each map comes from a single grouped
//! query; nothing here runs per wallet. The four queries are read-only and
//! independent, so callers are free to issue them concurrently.

use crate::db::Store;
use eyre::Result;
use std::collections::HashMap;

/// Feedback summary for one wallet, joined through its `erc8004_id`.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackAgg {
    /// Number of attestations addressed to the wallet's agent id.
    pub count: i64,
    /// Arithmetic mean of the scaled values.
    pub average: f64,
}

/// Economic volume summary for one wallet.
#[derive(Debug, Clone, Copy)]
pub struct VolumeAgg {
    /// Sum of `amount_usdc` over transactions the wallet participated in.
    pub total_usdc: f64,
    /// Distinct counterparties contributing to that volume.
    pub counterparties: i64,
}

/// Directional participation counts for one wallet.
#[derive(Debug, Clone, Copy)]
pub struct RoleAgg {
    /// Transactions where the wallet paid.
    pub as_payer: i64,
    /// Transactions where the wallet received.
    pub as_recipient: i64,
}

impl Store {
    /// Distinct counterparties per address, across both directions.
    pub async fn counterparty_stats(&self) -> Result<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT address, COUNT(DISTINCT counterparty)
            FROM (
                SELECT payer AS address, recipient AS counterparty
                FROM transactions WHERE payer IS NOT NULL AND recipient IS NOT NULL
                UNION ALL
                SELECT recipient AS address, payer AS counterparty
                FROM transactions WHERE payer IS NOT NULL AND recipient IS NOT NULL
            ) pairs
            GROUP BY address
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Feedback count and mean value per wallet address.
    ///
    /// `value` is stored unscaled next to its `value_decimals`, so the
    /// scaling happens here, inside the aggregate.
    pub async fn feedback_stats(&self) -> Result<HashMap<String, FeedbackAgg>> {
        let rows: Vec<(String, i64, f64)> = sqlx::query_as(
            r#"
            SELECT w.address, COUNT(*), AVG(f.value / POWER(10, f.value_decimals))::FLOAT8
            FROM feedback f
            JOIN wallets w ON w.erc8004_id = f.agent_id
            GROUP BY w.address
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(address, count, average)| (address, FeedbackAgg { count, average }))
            .collect())
    }

    /// Total USDC volume and contributing counterparties per address.
    ///
    /// One-sided transactions still count toward volume; their missing
    /// counterparty simply doesn't add to the distinct count.
    pub async fn volume_stats(&self) -> Result<HashMap<String, VolumeAgg>> {
        let rows: Vec<(String, f64, i64)> = sqlx::query_as(
            r#"
            SELECT address, SUM(amount_usdc)::FLOAT8, COUNT(DISTINCT counterparty)
            FROM (
                SELECT payer AS address, recipient AS counterparty, amount_usdc
                FROM transactions WHERE payer IS NOT NULL
                UNION ALL
                SELECT recipient AS address, payer AS counterparty, amount_usdc
                FROM transactions WHERE recipient IS NOT NULL
            ) flows
            GROUP BY address
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(address, total_usdc, counterparties)| {
                (address, VolumeAgg { total_usdc, counterparties })
            })
            .collect())
    }

    /// Payer/recipient participation counts per address.
    pub async fn role_stats(&self) -> Result<HashMap<String, RoleAgg>> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT address, SUM(paid)::BIGINT, SUM(received)::BIGINT
            FROM (
                SELECT payer AS address, 1::BIGINT AS paid, 0::BIGINT AS received
                FROM transactions WHERE payer IS NOT NULL
                UNION ALL
                SELECT recipient AS address, 0::BIGINT AS paid, 1::BIGINT AS received
                FROM transactions WHERE recipient IS NOT NULL
            ) sides
            GROUP BY address
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(address, as_payer, as_recipient)| {
                (address, RoleAgg { as_payer, as_recipient })
            })
            .collect())
    }
}
