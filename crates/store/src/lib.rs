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

//! Durable relational store for wallets, transactions, feedback, scanner
//! cursors, score snapshots and webhook registrations.
//!
//! Write-sets are partitioned by component: indexers touch `wallets`,
//! `transactions`, `feedback` and `indexer_state`; the scoring engine
//! touches the scoring columns of `wallets` plus `score_history`; the
//! dispatcher touches webhook delivery metadata. Every insert is idempotent
//! on the unique key of its table, which is what makes concurrent scanner
//! runs and re-runs safe without explicit locking.

pub mod aggregate;
pub mod cursor;
pub mod db;
pub mod feedback;
pub mod models;
pub mod scores;
pub mod transactions;
pub mod wallets;
pub mod webhooks;

pub use aggregate::{FeedbackAgg, RoleAgg, VolumeAgg};
pub use db::{ScoringLock, Store};
pub use models::{
    FeedbackSource, NewFeedback, NewTransaction, Role, Source, WalletRow, WebhookEvent, WebhookRow,
};
