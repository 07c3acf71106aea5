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

//! x402 settlements → transaction rows and wallet upserts.
//!
//! The scan filter is `AuthorizationUsed` on the chain's USDC contract;
//! the actual money movement comes from the USDC `Transfer` logs inside
//! each settlement receipt. Receipt and envelope are fetched once per
//! distinct transaction hash, whatever the batch contains.

use super::BatchStats;
use crate::{
    events::{
        decode_authorization_used, decode_usdc_transfer, format_address, usdc_amount,
        AUTHORIZATION_USED_TOPIC, TRANSFER_TOPIC,
    },
    gateway::{Gateway, LogRecord},
    scanner::estimate_block_timestamp,
};
use alloy_primitives::Address;
use eyre::Result;
use karma_common::Chain;
use karma_store::{NewTransaction, Store};
use std::collections::HashSet;
use tracing::warn;

pub(crate) async fn apply(
    gateway: &Gateway,
    store: &Store,
    chain: Chain,
    facilitators: &[Address],
    head: u64,
    logs: &[LogRecord],
) -> Result<BatchStats> {
    let mut stats = BatchStats::default();
    let usdc = chain.usdc();

    // Distinct settlement transactions, in batch order.
    let mut seen = HashSet::new();
    let mut hashes = Vec::new();
    for log in logs {
        if let Some(hash) = log.transaction_hash {
            if seen.insert(hash) {
                hashes.push(hash);
            }
        }
    }

    for hash in hashes {
        // One receipt and one envelope per settlement; a batch-wide RPC
        // failure propagates and aborts the run with the cursor intact.
        let receipt = gateway.receipt(hash).await?;
        let envelope = gateway.transaction(hash).await?;

        let facilitator = envelope.from;
        let is_x402 = facilitators.contains(&facilitator);

        // At most one AuthorizationUsed is paired per settlement; the
        // first match wins and the payer is the fallback.
        let authorizer = receipt
            .logs
            .iter()
            .filter(|l| l.address == usdc && l.topic0() == Some(AUTHORIZATION_USED_TOPIC))
            .find_map(|l| decode_authorization_used(l).ok());

        let block = receipt.block_number.map(|b| b.to::<u64>()).unwrap_or(head);
        let block_timestamp = estimate_block_timestamp(chain, head, block);

        for log in receipt
            .logs
            .iter()
            .filter(|l| l.address == usdc && l.topic0() == Some(TRANSFER_TOPIC))
        {
            let transfer = match decode_usdc_transfer(log) {
                Ok(transfer) => transfer,
                Err(err) => {
                    warn!(tx_hash = %hash, error = %err, "skipping undecodable USDC transfer");
                    stats.skipped += 1;
                    continue;
                }
            };

            let (amount_raw, amount_usdc) = usdc_amount(transfer.amount);
            let row = NewTransaction {
                tx_hash: format!("{hash:#x}"),
                chain: chain.short().to_string(),
                block_number: block as i64,
                authorizer: Some(format_address(authorizer.unwrap_or(transfer.payer))),
                payer: Some(format_address(transfer.payer)),
                recipient: Some(format_address(transfer.recipient)),
                amount_raw,
                amount_usdc,
                facilitator: Some(format_address(facilitator)),
                is_x402,
                block_timestamp,
            };

            match store.insert_transaction(&row).await {
                Ok(true) => {
                    stats.events += 1;
                    for party in [transfer.payer, transfer.recipient] {
                        let address = format_address(party);
                        match store
                            .upsert_payment_wallet(&address, chain.short(), block_timestamp)
                            .await
                        {
                            Ok(()) => stats.wallets += 1,
                            Err(err) => {
                                warn!(%address, error = %err, "skipping failed payment wallet upsert");
                                stats.skipped += 1;
                            }
                        }
                    }
                }
                Ok(false) => {} // already indexed; wallet counters stay untouched
                Err(err) => {
                    warn!(tx_hash = %row.tx_hash, error = %err, "skipping failed transaction insert");
                    stats.skipped += 1;
                }
            }
        }
    }

    Ok(stats)
}
