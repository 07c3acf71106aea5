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

//! Process configuration, resolved once at startup from the environment.

use crate::{
    chains::{Chain, ChainConfig, DEFAULT_FACILITATORS},
    env,
};
use alloy_primitives::Address;
use eyre::{Result, WrapErr};

/// Default RPC URL template. `{chain}` takes the chain's subdomain,
/// `{key}` the provider API key.
pub const DEFAULT_RPC_URL_TEMPLATE: &str = "https://{chain}.g.alchemy.com/v2/{key}";

/// Default monthly compute-unit budget (free-tier allotment).
pub const DEFAULT_CU_BUDGET: u64 = 300_000_000;

/// Everything the pipeline reads from the environment.
///
/// Missing required values fail here, at startup, with a message naming the
/// variable; nothing downstream re-validates.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection URL.
    pub database_url: String,
    /// RPC provider API key.
    pub rpc_api_key: String,
    /// RPC URL template with `{chain}` and `{key}` placeholders.
    pub rpc_url_template: String,
    /// Listen port for the out-of-tree read API.
    pub api_port: u16,
    /// Monthly compute-unit budget.
    pub cu_budget: u64,
    /// Known facilitator accounts.
    pub facilitators: Vec<Address>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let database_url = required(env::DATABASE_URL)?;
        let rpc_api_key = required(env::KARMA_RPC_API_KEY)?;
        let rpc_url_template = std::env::var(env::KARMA_RPC_URL_TEMPLATE)
            .unwrap_or_else(|_| DEFAULT_RPC_URL_TEMPLATE.to_string());

        let api_port = match std::env::var(env::KARMA_API_PORT) {
            Ok(raw) => raw
                .parse::<u16>()
                .wrap_err_with(|| format!("invalid port in {}", env::KARMA_API_PORT))?,
            Err(_) => 3000,
        };

        let cu_budget = match std::env::var(env::KARMA_CU_BUDGET) {
            Ok(raw) => raw
                .parse::<u64>()
                .wrap_err_with(|| format!("invalid budget in {}", env::KARMA_CU_BUDGET))?,
            Err(_) => DEFAULT_CU_BUDGET,
        };

        let facilitators = match std::env::var(env::KARMA_FACILITATORS) {
            Ok(raw) => parse_facilitators(&raw)?,
            Err(_) => DEFAULT_FACILITATORS.to_vec(),
        };

        Ok(Self { database_url, rpc_api_key, rpc_url_template, api_port, cu_budget, facilitators })
    }

    /// RPC endpoint for one chain, with the template placeholders filled in.
    pub fn rpc_url(&self, chain: Chain) -> String {
        self.rpc_url_template
            .replace("{chain}", chain.rpc_subdomain())
            .replace("{key}", &self.rpc_api_key)
    }

    /// Resolve the full per-chain configuration (catalog defaults merged
    /// with env overrides).
    pub fn chain_config(&self, chain: Chain) -> Result<ChainConfig> {
        ChainConfig::resolve(chain, self.rpc_url(chain), self.facilitators.clone())
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| eyre::eyre!("missing required environment variable {name}"))
}

fn parse_facilitators(raw: &str) -> Result<Vec<Address>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Address>()
                .map_err(|e| eyre::eyre!("invalid facilitator address {s:?}: {e}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_url_fills_template() {
        let config = Config {
            database_url: "postgres://localhost/karma".into(),
            rpc_api_key: "test-key".into(),
            rpc_url_template: DEFAULT_RPC_URL_TEMPLATE.into(),
            api_port: 3000,
            cu_budget: DEFAULT_CU_BUDGET,
            facilitators: vec![],
        };

        assert_eq!(
            config.rpc_url(Chain::Base),
            "https://base-mainnet.g.alchemy.com/v2/test-key"
        );
        assert_eq!(
            config.rpc_url(Chain::Arbitrum),
            "https://arb-mainnet.g.alchemy.com/v2/test-key"
        );
    }

    #[test]
    fn facilitator_list_parses_and_rejects() {
        let parsed = parse_facilitators(
            "0x2c8d5a49c1b3e7f06d9a8b4c5e2f1a0d3b6c7e8f, 0x6a7b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8b",
        )
        .unwrap();
        assert_eq!(parsed.len(), 2);

        assert!(parse_facilitators("not-an-address").is_err());
    }
}
