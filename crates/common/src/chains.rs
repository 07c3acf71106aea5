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

//! The chain catalog: every supported EVM chain with its constants.
//!
//! Contract addresses, genesis blocks and the facilitator set are defaults;
//! all of them can be overridden through the environment (see
//! [`crate::config::Config::chain_config`]).

use alloy_primitives::{address, Address};
use std::{fmt, str::FromStr, time::Duration};

/// Native USDC on Ethereum mainnet.
pub const USDC_ETHEREUM: Address = address!("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
/// Native USDC on Base.
pub const USDC_BASE: Address = address!("0x833589fcd6edb6e08f4c7c32d4f71b54bda02913");
/// Native USDC on Arbitrum One.
pub const USDC_ARBITRUM: Address = address!("0xaf88d065e77c8cc2239327c5edb3a432268e5831");

/// Default ERC-8004 identity registry deployments.
const IDENTITY_REGISTRY_ETHEREUM: Address = address!("0x8004e3c1a9f6c0e5b2d8a41f7c93e60b1d2a8f55");
const IDENTITY_REGISTRY_BASE: Address = address!("0x8004d84c3b2a1f0e9d8c7b6a5f4e3d2c1b0a9f84");

/// Default ERC-8004 reputation registry deployments.
const REPUTATION_REGISTRY_ETHEREUM: Address =
    address!("0x8004f2b7d1c84a6e90f3b5a2c7d8e41f6a90b3c2");
const REPUTATION_REGISTRY_BASE: Address = address!("0x8004c5d2e1f4a3b6c9d8e7f0a1b2c3d4e5f6a7b8");

/// Facilitator accounts known to settle x402 payments on behalf of payers.
///
/// A transaction whose gas-paying sender is one of these is flagged
/// `is_x402`. Operators extend the set via `KARMA_FACILITATORS`.
pub const DEFAULT_FACILITATORS: &[Address] = &[
    address!("0x2c8d5a49c1b3e7f06d9a8b4c5e2f1a0d3b6c7e8f"),
    address!("0x6a7b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8b"),
];

/// A supported EVM chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    /// Ethereum mainnet (chain id 1). Carries the ERC-8004 registries.
    Ethereum,
    /// Base (chain id 8453). Carries the registries and x402 payments.
    Base,
    /// Arbitrum One (chain id 42161). Carries x402 payments.
    Arbitrum,
}

impl Chain {
    /// All supported chains, in catalog order.
    pub const ALL: [Self; 3] = [Self::Ethereum, Self::Base, Self::Arbitrum];

    /// Short identifier used in scanner ids and env-var suffixes.
    pub fn short(&self) -> &'static str {
        match self {
            Self::Ethereum => "eth",
            Self::Base => "base",
            Self::Arbitrum => "arb",
        }
    }

    /// Subdomain slot for the RPC URL template.
    pub fn rpc_subdomain(&self) -> &'static str {
        match self {
            Self::Ethereum => "eth-mainnet",
            Self::Base => "base-mainnet",
            Self::Arbitrum => "arb-mainnet",
        }
    }

    /// EIP-155 chain id.
    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Ethereum => 1,
            Self::Base => 8453,
            Self::Arbitrum => 42161,
        }
    }

    /// Average block time, used to translate `--days` windows into blocks
    /// and to estimate block timestamps from the head distance.
    pub fn block_time_secs(&self) -> f64 {
        match self {
            Self::Ethereum => 12.0,
            Self::Base => 2.0,
            Self::Arbitrum => 0.25,
        }
    }

    /// Blocks produced per day on average.
    pub fn blocks_per_day(&self) -> u64 {
        (86_400.0 / self.block_time_secs()) as u64
    }

    /// Pause between successful scan batches. Arbitrum's faster blocks get
    /// a smaller delay.
    pub fn pacing(&self) -> Duration {
        match self {
            Self::Ethereum | Self::Base => Duration::from_millis(100),
            Self::Arbitrum => Duration::from_millis(50),
        }
    }

    /// The chain's native USDC contract.
    pub fn usdc(&self) -> Address {
        match self {
            Self::Ethereum => USDC_ETHEREUM,
            Self::Base => USDC_BASE,
            Self::Arbitrum => USDC_ARBITRUM,
        }
    }

    /// Whether the ERC-8004 registries are deployed here.
    pub fn has_registries(&self) -> bool {
        matches!(self, Self::Ethereum | Self::Base)
    }

    /// Whether x402 payment settlement happens here.
    pub fn has_payments(&self) -> bool {
        matches!(self, Self::Base | Self::Arbitrum)
    }

    fn default_identity_registry(&self) -> Option<Address> {
        match self {
            Self::Ethereum => Some(IDENTITY_REGISTRY_ETHEREUM),
            Self::Base => Some(IDENTITY_REGISTRY_BASE),
            Self::Arbitrum => None,
        }
    }

    fn default_reputation_registry(&self) -> Option<Address> {
        match self {
            Self::Ethereum => Some(REPUTATION_REGISTRY_ETHEREUM),
            Self::Base => Some(REPUTATION_REGISTRY_BASE),
            Self::Arbitrum => None,
        }
    }

    /// Deploy block of the registries; scans never start earlier.
    fn default_registry_genesis(&self) -> u64 {
        match self {
            // Identity and reputation registries share a deploy block here.
            Self::Ethereum => 21_300_000,
            Self::Base => 23_000_000,
            Self::Arbitrum => 0,
        }
    }

    /// Earliest block worth scanning for x402 settlements.
    fn default_payment_genesis(&self) -> u64 {
        match self {
            Self::Ethereum => 0,
            Self::Base => 23_000_000,
            Self::Arbitrum => 280_000_000,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ethereum => write!(f, "ethereum"),
            Self::Base => write!(f, "base"),
            Self::Arbitrum => write!(f, "arbitrum"),
        }
    }
}

impl FromStr for Chain {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" => Ok(Self::Ethereum),
            "base" => Ok(Self::Base),
            "arbitrum" | "arb" => Ok(Self::Arbitrum),
            other => Err(eyre::eyre!("unknown chain: {other}")),
        }
    }
}

/// Fully resolved per-chain configuration: catalog defaults merged with
/// environment overrides and the process-level RPC credentials.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Which chain this is.
    pub chain: Chain,
    /// Resolved RPC endpoint for this chain.
    pub rpc_url: String,
    /// ERC-8004 identity registry, if deployed on this chain.
    pub identity_registry: Option<Address>,
    /// ERC-8004 reputation registry, if deployed on this chain.
    pub reputation_registry: Option<Address>,
    /// First block the registry scanners consider.
    pub registry_genesis: u64,
    /// First block the payment scanner considers.
    pub payment_genesis: u64,
    /// Known facilitator accounts.
    pub facilitators: Vec<Address>,
}

impl ChainConfig {
    pub(crate) fn resolve(
        chain: Chain,
        rpc_url: String,
        facilitators: Vec<Address>,
    ) -> eyre::Result<Self> {
        let suffix = chain.short().to_ascii_uppercase();

        let identity_registry = override_address(
            &format!("{}{suffix}", crate::env::KARMA_IDENTITY_REGISTRY_PREFIX),
            chain.default_identity_registry(),
        )?;
        let reputation_registry = override_address(
            &format!("{}{suffix}", crate::env::KARMA_REPUTATION_REGISTRY_PREFIX),
            chain.default_reputation_registry(),
        )?;
        let registry_genesis = override_u64(
            &format!("{}{suffix}", crate::env::KARMA_REGISTRY_GENESIS_PREFIX),
            chain.default_registry_genesis(),
        )?;
        let payment_genesis = override_u64(
            &format!("{}{suffix}", crate::env::KARMA_PAYMENT_GENESIS_PREFIX),
            chain.default_payment_genesis(),
        )?;

        Ok(Self {
            chain,
            rpc_url,
            identity_registry,
            reputation_registry,
            registry_genesis,
            payment_genesis,
            facilitators,
        })
    }
}

fn override_address(name: &str, default: Option<Address>) -> eyre::Result<Option<Address>> {
    match std::env::var(name) {
        Ok(raw) => {
            let addr = raw
                .parse::<Address>()
                .map_err(|e| eyre::eyre!("invalid address in {name}: {e}"))?;
            Ok(Some(addr))
        }
        Err(_) => Ok(default),
    }
}

fn override_u64(name: &str, default: u64) -> eyre::Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw.parse::<u64>().map_err(|e| eyre::eyre!("invalid value in {name}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_parsing_accepts_aliases() {
        assert_eq!("ethereum".parse::<Chain>().unwrap(), Chain::Ethereum);
        assert_eq!("eth".parse::<Chain>().unwrap(), Chain::Ethereum);
        assert_eq!("Base".parse::<Chain>().unwrap(), Chain::Base);
        assert_eq!("arb".parse::<Chain>().unwrap(), Chain::Arbitrum);
        assert!("solana".parse::<Chain>().is_err());
    }

    #[test]
    fn capability_matrix() {
        assert!(Chain::Ethereum.has_registries());
        assert!(!Chain::Ethereum.has_payments());
        assert!(Chain::Base.has_registries());
        assert!(Chain::Base.has_payments());
        assert!(!Chain::Arbitrum.has_registries());
        assert!(Chain::Arbitrum.has_payments());
    }

    #[test]
    fn blocks_per_day_tracks_block_time() {
        assert_eq!(Chain::Ethereum.blocks_per_day(), 7_200);
        assert_eq!(Chain::Base.blocks_per_day(), 43_200);
        assert_eq!(Chain::Arbitrum.blocks_per_day(), 345_600);
    }
}
