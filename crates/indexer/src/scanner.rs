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

//! The generic batch scanner.
//!
//! One scanner exists per (chain, event source) pair; all of them share
//! this loop. Batches are processed and committed in strictly ascending
//! block order and the cursor never advances past an uncommitted batch,
//! which is the whole resumability story: an interrupt loses at most the
//! in-flight batch, and the idempotent inserts make redoing it free.

use crate::{
    budget::BudgetGovernor,
    gateway::Gateway,
    sources::{self, BatchStats, SourceKind},
};
use alloy_primitives::{Address, B256};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use eyre::{Result, WrapErr};
use karma_common::Chain;
use karma_store::Store;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Blocks per `eth_getLogs` window. Hard ceiling imposed by the free-tier
/// RPC provider; exceeding it is a terminal configuration error.
pub const BATCH_BLOCKS: u64 = 10;

/// Operator controls for one scan run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Default window (in days) when no cursor exists.
    pub days: Option<u64>,
    /// Cap on blocks scanned this run.
    pub limit: Option<u64>,
}

/// How a scan run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The cursor was already at the chain head.
    UpToDate,
    /// The planned range was fully processed.
    Completed,
    /// The budget governor's terminal flag stopped the run early.
    BudgetStop,
}

/// Per-scanner run summary, aggregated into the CLI report.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    /// Scanner id, e.g. `x402_base`.
    pub scanner_id: String,
    /// Chain scanned.
    pub chain: Chain,
    /// How the run ended.
    pub outcome: ScanOutcome,
    /// Inclusive range this run covered, when any.
    pub range: Option<(u64, u64)>,
    /// Batches committed.
    pub batches: u64,
    /// Events decoded and persisted.
    pub events_found: u64,
    /// Rows skipped on per-row errors.
    pub rows_skipped: u64,
    /// Wallet mutations performed.
    pub wallets_touched: u64,
    /// Cursor position after the run.
    pub cursor: Option<u64>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// A (chain, event-source) scanner instance.
#[derive(Debug, Clone)]
pub struct Scanner {
    pub(crate) id: String,
    pub(crate) chain: Chain,
    pub(crate) contract: Address,
    pub(crate) topics: Vec<B256>,
    pub(crate) genesis: u64,
    pub(crate) kind: SourceKind,
}

impl Scanner {
    /// Scanner id, stable across runs; keys the cursor row.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Drive the batch loop until the range is exhausted, the budget stops
    /// us, or an unrecoverable error aborts the run.
    pub async fn run(
        &self,
        gateway: &Gateway,
        store: &Store,
        governor: &BudgetGovernor,
        opts: &ScanOptions,
    ) -> Result<ScanSummary> {
        let started = Instant::now();

        let cursor = store
            .cursor(&self.id)
            .await
            .wrap_err_with(|| format!("{}: reading cursor", self.id))?;
        let head = gateway
            .head()
            .await
            .wrap_err_with(|| format!("{}: fetching chain head", self.id))?;

        let mut summary = ScanSummary {
            scanner_id: self.id.clone(),
            chain: self.chain,
            outcome: ScanOutcome::Completed,
            range: None,
            batches: 0,
            events_found: 0,
            rows_skipped: 0,
            wallets_touched: 0,
            cursor: cursor.map(|c| c as u64),
            elapsed: Duration::ZERO,
        };

        let Some((from, to)) =
            scan_range(cursor.map(|c| c as u64), head, self.genesis, self.chain.blocks_per_day(), opts)
        else {
            info!(scanner = %self.id, head, "up-to-date, nothing to scan");
            summary.outcome = ScanOutcome::UpToDate;
            summary.elapsed = started.elapsed();
            return Ok(summary);
        };

        summary.range = Some((from, to));
        info!(scanner = %self.id, from, to, head, "scanning");

        let mut cur = from;
        while cur <= to {
            if governor.should_stop() {
                warn!(scanner = %self.id, cursor = cur.saturating_sub(1), "budget exhausted, stopping cleanly");
                summary.outcome = ScanOutcome::BudgetStop;
                break;
            }

            let batch_end = (cur + BATCH_BLOCKS - 1).min(to);
            let logs = gateway
                .logs(self.contract, &self.topics, cur, batch_end)
                .await
                .wrap_err_with(|| format!("{}: fetching logs [{cur}, {batch_end}]", self.id))?;

            let stats = self.apply(gateway, store, head, &logs).await?;
            summary.events_found += stats.events;
            summary.rows_skipped += stats.skipped;
            summary.wallets_touched += stats.wallets;

            self.commit_cursor(store, batch_end).await?;
            summary.cursor = Some(batch_end);
            summary.batches += 1;

            cur = batch_end + 1;
            if cur <= to {
                tokio::time::sleep(self.chain.pacing()).await;
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            scanner = %self.id,
            outcome = ?summary.outcome,
            batches = summary.batches,
            events = summary.events_found,
            skipped = summary.rows_skipped,
            "scan finished"
        );
        Ok(summary)
    }

    async fn apply(
        &self,
        gateway: &Gateway,
        store: &Store,
        head: u64,
        logs: &[crate::gateway::LogRecord],
    ) -> Result<BatchStats> {
        match &self.kind {
            SourceKind::Identity => sources::identity::apply(store, self.chain, head, logs).await,
            SourceKind::Feedback => sources::feedback::apply(store, self.chain, head, logs).await,
            SourceKind::Payment { facilitators } => {
                sources::payment::apply(gateway, store, self.chain, facilitators, head, logs).await
            }
        }
    }

    /// Commit the cursor, retrying once on a transient database failure.
    /// A second failure surfaces loudly; the redo is safe because every
    /// insert is idempotent.
    async fn commit_cursor(&self, store: &Store, batch_end: u64) -> Result<()> {
        if let Err(first) = store.commit_cursor(&self.id, batch_end as i64).await {
            warn!(scanner = %self.id, batch_end, error = %first, "cursor commit failed, retrying once");
            tokio::time::sleep(Duration::from_millis(500)).await;
            if let Err(second) = store.commit_cursor(&self.id, batch_end as i64).await {
                error!(
                    scanner = %self.id,
                    batch_end,
                    error = %second,
                    "cursor commit failed twice, aborting run; the batch will be redone on restart"
                );
                return Err(second.wrap_err(format!("{}: committing cursor", self.id)));
            }
        }
        Ok(())
    }
}

/// Compute the inclusive scan range for one run, or `None` when there is
/// nothing to do.
pub(crate) fn scan_range(
    cursor: Option<u64>,
    head: u64,
    genesis: u64,
    blocks_per_day: u64,
    opts: &ScanOptions,
) -> Option<(u64, u64)> {
    let from = match (cursor, opts.days) {
        (Some(last_block), _) => last_block + 1,
        (None, Some(days)) => head.saturating_sub(days * blocks_per_day).max(genesis),
        (None, None) => genesis,
    };

    let to = match opts.limit {
        Some(limit) if limit > 0 => head.min(from + limit - 1),
        Some(_) => return None,
        None => head,
    };

    (from <= to).then_some((from, to))
}

/// Estimate a block's timestamp from its distance to the head.
///
/// The gateway's wire surface has no block-by-number call, so day-granular
/// consumers (age and recency signals) work off this estimate.
pub(crate) fn estimate_block_timestamp(chain: Chain, head: u64, block: u64) -> DateTime<Utc> {
    let behind_secs = head.saturating_sub(block) as f64 * chain.block_time_secs();
    Utc::now() - ChronoDuration::milliseconds((behind_secs * 1_000.0) as i64)
}
