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

//! Identity registry mints → wallet upserts.

use super::BatchStats;
use crate::{
    events::{decode_identity_mint, format_address},
    gateway::LogRecord,
    scanner::estimate_block_timestamp,
};
use eyre::Result;
use karma_common::Chain;
use karma_store::Store;
use std::collections::HashSet;
use tracing::warn;

pub(crate) async fn apply(
    store: &Store,
    chain: Chain,
    head: u64,
    logs: &[LogRecord],
) -> Result<BatchStats> {
    let mut stats = BatchStats::default();
    // Several NFTs can mint to one owner inside a batch; dedupe by address
    // so the upsert runs once per wallet.
    let mut seen = HashSet::new();

    for log in logs {
        let mint = match decode_identity_mint(log) {
            Ok(mint) => mint,
            Err(err) => {
                warn!(chain = %chain, error = %err, "skipping undecodable identity log");
                stats.skipped += 1;
                continue;
            }
        };

        if !seen.insert(mint.owner) {
            continue;
        }

        let block = log.block_number.map(|b| b.to::<u64>()).unwrap_or(head);
        let seen_at = estimate_block_timestamp(chain, head, block);
        let address = format_address(mint.owner);

        match store
            .upsert_identity_wallet(&address, chain.short(), mint.token_id, seen_at)
            .await
        {
            Ok(()) => {
                stats.events += 1;
                stats.wallets += 1;
            }
            Err(err) => {
                warn!(%address, error = %err, "skipping failed identity wallet upsert");
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}
