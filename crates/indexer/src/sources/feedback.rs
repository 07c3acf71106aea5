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

//! Reputation registry attestations → feedback rows.
//!
//! No wallet mutation happens here; feedback joins to wallets through
//! `erc8004_id` at aggregation time.

use super::BatchStats;
use crate::{
    events::{decode_new_feedback, format_address},
    gateway::LogRecord,
    scanner::estimate_block_timestamp,
};
use bigdecimal::BigDecimal;
use eyre::Result;
use karma_common::Chain;
use karma_store::{NewFeedback, Store};
use tracing::warn;

pub(crate) async fn apply(
    store: &Store,
    chain: Chain,
    head: u64,
    logs: &[LogRecord],
) -> Result<BatchStats> {
    let mut stats = BatchStats::default();

    for log in logs {
        let event = match decode_new_feedback(log) {
            Ok(event) => event,
            Err(err) => {
                warn!(chain = %chain, error = %err, "skipping undecodable feedback log");
                stats.skipped += 1;
                continue;
            }
        };

        let (Some(tx_hash), Some(log_index)) = (log.transaction_hash, log.log_index) else {
            warn!(chain = %chain, "skipping feedback log without block metadata");
            stats.skipped += 1;
            continue;
        };

        let block = log.block_number.map(|b| b.to::<u64>()).unwrap_or(head);
        let row = NewFeedback {
            tx_hash: format!("{tx_hash:#x}"),
            feedback_index: log_index.to::<u64>() as i64,
            agent_id: event.agent_id,
            client_address: format_address(event.client_address),
            value: BigDecimal::from(event.value),
            value_decimals: event.value_decimals as i16,
            tag1: event.tag1,
            tag2: event.tag2,
            endpoint: event.endpoint,
            feedback_uri: event.feedback_uri,
            content_hash: Some(format!("{:#x}", event.content_hash)),
            block_number: block as i64,
            block_timestamp: estimate_block_timestamp(chain, head, block),
        };

        match store.insert_feedback(&row).await {
            Ok(true) => stats.events += 1,
            Ok(false) => {} // already indexed
            Err(err) => {
                warn!(tx_hash = %row.tx_hash, error = %err, "skipping failed feedback insert");
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}
