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

//! The scoring pass.
//!
//! Selection is incremental by default (`needs_rescore` wallets only) or
//! `full`. The engine must never overlap with itself: a Postgres advisory
//! lock enforces the single-writer discipline, and a second concurrent run
//! fails fast instead of queueing.

use crate::signals::{compose, SignalBundle};
use chrono::Utc;
use eyre::Result;
use karma_store::{Role, Store};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// One wallet's score delta out of a pass; the dispatcher's input.
#[derive(Debug, Clone)]
pub struct ScoreUpdate {
    /// Wallet address, lowercased.
    pub address: String,
    /// Score before the pass; `None` for a first-ever score.
    pub old_score: Option<i32>,
    /// Score after the pass.
    pub new_score: i32,
}

impl ScoreUpdate {
    /// Signed delta, when a previous score exists.
    pub fn delta(&self) -> Option<i32> {
        self.old_score.map(|old| self.new_score - old)
    }
}

/// Result of one scoring pass.
#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    /// Every wallet persisted this pass, in selection order.
    pub updates: Vec<ScoreUpdate>,
    /// Wallets skipped on per-wallet errors.
    pub skipped: u64,
    /// Wall-clock duration of the pass.
    pub elapsed: Duration,
}

/// Drives aggregation, shaping and persistence for one pass.
#[derive(Debug)]
pub struct ScoringEngine {
    store: Store,
}

impl ScoringEngine {
    /// Create an engine over the shared store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Run one scoring pass.
    ///
    /// Fails fast when another pass holds the scoring lock. Per-wallet
    /// failures are logged and skipped; they never abort the pass.
    pub async fn run_pass(&self, full: bool) -> Result<ScoringOutcome> {
        let Some(lock) = self.store.try_scoring_lock().await? else {
            eyre::bail!("another scoring run is in progress");
        };

        let result = self.run_locked(full).await;

        if let Err(err) = lock.release().await {
            warn!(error = %err, "failed to release the scoring lock");
        }
        result
    }

    async fn run_locked(&self, full: bool) -> Result<ScoringOutcome> {
        let started = Instant::now();

        // The four aggregates are read-only and independent.
        let (counterparties, feedback, volume, roles) = tokio::try_join!(
            self.store.counterparty_stats(),
            self.store.feedback_stats(),
            self.store.volume_stats(),
            self.store.role_stats(),
        )?;

        let wallets = self.store.wallets_for_scoring(full).await?;
        info!(selected = wallets.len(), full, "scoring pass starting");

        let now = Utc::now();
        let mut updates = Vec::with_capacity(wallets.len());
        let mut skipped = 0u64;

        for wallet in &wallets {
            let bundle = SignalBundle {
                tx_count: wallet.tx_count,
                first_seen_at: wallet.first_seen_at,
                last_seen_at: wallet.last_seen_at,
                unique_counterparties: counterparties.get(&wallet.address).copied().unwrap_or(0),
                avg_feedback: feedback.get(&wallet.address).map(|agg| agg.average),
                feedback_count: feedback.get(&wallet.address).map(|agg| agg.count).unwrap_or(0),
                total_volume_usdc: volume
                    .get(&wallet.address)
                    .map(|agg| agg.total_usdc)
                    .unwrap_or(0.0),
                volume_counterparties: volume
                    .get(&wallet.address)
                    .map(|agg| agg.counterparties)
                    .unwrap_or(0),
                is_registered: wallet.erc8004_id.is_some(),
            };

            let (score, breakdown) = compose(&bundle, now);
            let role = roles.get(&wallet.address).and_then(|agg| derive_role(agg.as_payer, agg.as_recipient));

            let breakdown_json = match serde_json::to_value(breakdown) {
                Ok(value) => value,
                Err(err) => {
                    warn!(address = %wallet.address, error = %err, "skipping wallet with unserializable breakdown");
                    skipped += 1;
                    continue;
                }
            };

            match self.store.persist_score(&wallet.address, score, &breakdown_json, role).await {
                Ok(()) => updates.push(ScoreUpdate {
                    address: wallet.address.clone(),
                    old_score: wallet.trust_score,
                    new_score: score,
                }),
                Err(err) => {
                    warn!(address = %wallet.address, error = %err, "skipping wallet that failed to persist");
                    skipped += 1;
                }
            }
        }

        let outcome = ScoringOutcome { updates, skipped, elapsed: started.elapsed() };
        info!(
            scored = outcome.updates.len(),
            skipped = outcome.skipped,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "scoring pass finished"
        );
        Ok(outcome)
    }
}

/// Role from directional participation: both sides ⇒ `both`, payer-only ⇒
/// `buyer`, recipient-only ⇒ `seller`.
pub fn derive_role(as_payer: i64, as_recipient: i64) -> Option<Role> {
    match (as_payer > 0, as_recipient > 0) {
        (true, true) => Some(Role::Both),
        (true, false) => Some(Role::Buyer),
        (false, true) => Some(Role::Seller),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_derivation() {
        assert_eq!(derive_role(3, 2), Some(Role::Both));
        assert_eq!(derive_role(3, 0), Some(Role::Buyer));
        assert_eq!(derive_role(0, 2), Some(Role::Seller));
        assert_eq!(derive_role(0, 0), None);
    }

    #[test]
    fn delta_requires_a_previous_score() {
        let update = ScoreUpdate { address: "0xabc".into(), old_score: None, new_score: 60 };
        assert_eq!(update.delta(), None);

        let update = ScoreUpdate { address: "0xabc".into(), old_score: Some(85), new_score: 49 };
        assert_eq!(update.delta(), Some(-36));
    }
}
