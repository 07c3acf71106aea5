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

//! Common utilities shared across the Karma pipeline.
//!
//! This crate holds everything the indexer, scoring engine and notification
//! dispatcher agree on: the chain catalog with per-chain constants, process
//! configuration loaded from the environment, and the logging bootstrap.

pub mod chains;
pub mod config;
pub mod env;
pub mod logging;

pub use chains::{Chain, ChainConfig};
pub use config::Config;
