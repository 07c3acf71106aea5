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

//! The three event sources and the scanner inventory per chain.

use crate::{
    events::{AUTHORIZATION_USED_TOPIC, NEW_FEEDBACK_TOPIC, TRANSFER_TOPIC},
    scanner::Scanner,
};
use alloy_primitives::{Address, B256};
use karma_common::ChainConfig;

pub(crate) mod feedback;
pub(crate) mod identity;
pub(crate) mod payment;

/// Which decoding and persistence rules a scanner applies.
#[derive(Debug, Clone)]
pub enum SourceKind {
    /// Identity registry mints.
    Identity,
    /// Reputation registry attestations.
    Feedback,
    /// USDC meta-payment settlements.
    Payment {
        /// Accounts whose settlements count as x402.
        facilitators: Vec<Address>,
    },
}

/// Counters for one applied batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchStats {
    /// Events decoded and persisted.
    pub events: u64,
    /// Rows skipped on per-row decode or insert errors.
    pub skipped: u64,
    /// Wallet mutations performed.
    pub wallets: u64,
}

/// Build every scanner the chain's capabilities call for.
///
/// Scanner ids are stable (`erc8004_identity_base`, `x402_arb`, ...) and
/// key the cursor rows, so renaming one orphans its cursor.
pub fn scanners_for(config: &ChainConfig) -> Vec<Scanner> {
    let chain = config.chain;
    let short = chain.short();
    let mut scanners = Vec::new();

    if chain.has_registries() {
        if let Some(identity_registry) = config.identity_registry {
            scanners.push(Scanner {
                id: format!("erc8004_identity_{short}"),
                chain,
                contract: identity_registry,
                // Transfer from the zero address: mints only.
                topics: vec![TRANSFER_TOPIC, B256::ZERO],
                genesis: config.registry_genesis,
                kind: SourceKind::Identity,
            });
        }
        if let Some(reputation_registry) = config.reputation_registry {
            scanners.push(Scanner {
                id: format!("erc8004_feedback_{short}"),
                chain,
                contract: reputation_registry,
                topics: vec![NEW_FEEDBACK_TOPIC],
                genesis: config.registry_genesis,
                kind: SourceKind::Feedback,
            });
        }
    }

    if chain.has_payments() {
        scanners.push(Scanner {
            id: format!("x402_{short}"),
            chain,
            contract: chain.usdc(),
            topics: vec![AUTHORIZATION_USED_TOPIC],
            genesis: config.payment_genesis,
            kind: SourceKind::Payment { facilitators: config.facilitators.clone() },
        });
    }

    scanners
}

#[cfg(test)]
mod tests {
    use super::*;
    use karma_common::Chain;

    fn config(chain: Chain) -> ChainConfig {
        let process = karma_common::Config {
            database_url: "postgres://localhost/karma".into(),
            rpc_api_key: "key".into(),
            rpc_url_template: "https://{chain}.example/{key}".into(),
            api_port: 3000,
            cu_budget: 1,
            facilitators: vec![],
        };
        process.chain_config(chain).unwrap()
    }

    #[test]
    fn base_carries_all_three_scanners() {
        let scanners = scanners_for(&config(Chain::Base));
        let ids: Vec<_> = scanners.iter().map(|s| s.id().to_string()).collect();
        assert_eq!(ids, ["erc8004_identity_base", "erc8004_feedback_base", "x402_base"]);
    }

    #[test]
    fn arbitrum_carries_only_payments() {
        let scanners = scanners_for(&config(Chain::Arbitrum));
        let ids: Vec<_> = scanners.iter().map(|s| s.id().to_string()).collect();
        assert_eq!(ids, ["x402_arb"]);
    }

    #[test]
    fn ethereum_carries_only_registries() {
        let scanners = scanners_for(&config(Chain::Ethereum));
        let ids: Vec<_> = scanners.iter().map(|s| s.id().to_string()).collect();
        assert_eq!(ids, ["erc8004_identity_eth", "erc8004_feedback_eth"]);
    }
}
