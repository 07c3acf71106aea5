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

//! Environment variable name constants for Karma configuration.
//!
//! Single source of truth for every variable the pipeline reads. Required
//! variables abort startup when missing; everything else has a documented
//! default.

/// Postgres connection URL (required).
pub const DATABASE_URL: &str = "DATABASE_URL";

/// API key slotted into the RPC URL template (required).
pub const KARMA_RPC_API_KEY: &str = "KARMA_RPC_API_KEY";

/// RPC URL template with `{chain}` and `{key}` placeholders.
///
/// Default: `https://{chain}.g.alchemy.com/v2/{key}`.
pub const KARMA_RPC_URL_TEMPLATE: &str = "KARMA_RPC_URL_TEMPLATE";

/// Listen port handed to the (out-of-tree) read API. Default: 3000.
pub const KARMA_API_PORT: &str = "KARMA_API_PORT";

/// Monthly compute-unit budget for the RPC provider. Default: 300,000,000.
pub const KARMA_CU_BUDGET: &str = "KARMA_CU_BUDGET";

/// Comma-separated facilitator addresses, replacing the built-in set.
pub const KARMA_FACILITATORS: &str = "KARMA_FACILITATORS";

/// Per-chain identity registry override; suffixed with `ETH`/`BASE`/`ARB`.
pub const KARMA_IDENTITY_REGISTRY_PREFIX: &str = "KARMA_IDENTITY_REGISTRY_";

/// Per-chain reputation registry override; suffixed with `ETH`/`BASE`/`ARB`.
pub const KARMA_REPUTATION_REGISTRY_PREFIX: &str = "KARMA_REPUTATION_REGISTRY_";

/// Per-chain registry genesis override; suffixed with `ETH`/`BASE`/`ARB`.
pub const KARMA_REGISTRY_GENESIS_PREFIX: &str = "KARMA_REGISTRY_GENESIS_";

/// Per-chain payment genesis override; suffixed with `ETH`/`BASE`/`ARB`.
pub const KARMA_PAYMENT_GENESIS_PREFIX: &str = "KARMA_PAYMENT_GENESIS_";
