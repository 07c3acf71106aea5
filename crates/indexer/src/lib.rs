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

//! The resumable multi-chain event indexer.
//!
//! Structure follows the data path: the [`budget::BudgetGovernor`] meters
//! every RPC call the [`gateway::Gateway`] makes; [`events`] decodes the
//! raw logs; [`scanner::Scanner`] drives the batch loop for each
//! (chain, event-source) pair and persists through `karma-store`.
//!
//! Every scanner is resumable: interrupting a run loses at most the
//! in-flight batch, and re-running an already-processed range writes
//! nothing thanks to the store's idempotent keys.

pub mod budget;
pub mod events;
pub mod gateway;
pub mod scanner;
pub mod sources;

pub use budget::{BudgetGovernor, BudgetSnapshot};
pub use gateway::{Gateway, GatewayError, LogRecord, Receipt, TxEnvelope};
pub use scanner::{ScanOptions, ScanOutcome, ScanSummary, Scanner, BATCH_BLOCKS};
pub use sources::{scanners_for, BatchStats, SourceKind};
