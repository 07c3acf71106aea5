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

//! Signal aggregation and trust scoring.
//!
//! [`signals`] holds the pure shaping math; [`engine`] selects wallets,
//! pulls the aggregate maps from the store and persists scores with their
//! snapshot history; [`report`] renders the operator-facing pass summary.

pub mod engine;
pub mod report;
pub mod signals;

pub use engine::{ScoreUpdate, ScoringEngine, ScoringOutcome};
pub use report::TierDistribution;
pub use signals::{compose, ScoreBreakdown, SignalBundle, Tier};
