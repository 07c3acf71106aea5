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

//! Operator-facing pass summary: tier distribution and a sanity listing.

use crate::{engine::ScoringOutcome, signals::Tier};
use std::fmt::Write as _;

/// Wallet counts per tier band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierDistribution {
    /// Score ≥ 80.
    pub high: u64,
    /// Score in [50, 80).
    pub medium: u64,
    /// Score in [20, 50).
    pub low: u64,
    /// Score in [0, 20).
    pub minimal: u64,
}

impl TierDistribution {
    /// Tally the pass's updates into tier bands.
    pub fn from_outcome(outcome: &ScoringOutcome) -> Self {
        let mut distribution = Self::default();
        for update in &outcome.updates {
            match Tier::from_score(update.new_score) {
                Tier::High => distribution.high += 1,
                Tier::Medium => distribution.medium += 1,
                Tier::Low => distribution.low += 1,
                Tier::Minimal => distribution.minimal += 1,
            }
        }
        distribution
    }
}

/// Render the pass report: distribution by tier plus a top-10 / bottom-5
/// listing to eyeball.
pub fn render(outcome: &ScoringOutcome) -> String {
    let distribution = TierDistribution::from_outcome(outcome);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Scored {} wallets ({} skipped) in {:.1}s",
        outcome.updates.len(),
        outcome.skipped,
        outcome.elapsed.as_secs_f64()
    );
    let _ = writeln!(
        out,
        "Tiers: HIGH {} | MEDIUM {} | LOW {} | MINIMAL {}",
        distribution.high, distribution.medium, distribution.low, distribution.minimal
    );

    let mut ranked: Vec<_> = outcome.updates.iter().collect();
    ranked.sort_by(|a, b| b.new_score.cmp(&a.new_score).then_with(|| a.address.cmp(&b.address)));

    if !ranked.is_empty() {
        let _ = writeln!(out, "Top wallets:");
        for update in ranked.iter().take(10) {
            let _ = writeln!(
                out,
                "  {:>3}  {}  [{}]",
                update.new_score,
                update.address,
                Tier::from_score(update.new_score).label()
            );
        }
        if ranked.len() > 10 {
            let _ = writeln!(out, "Bottom wallets:");
            for update in ranked.iter().rev().take(5).rev() {
                let _ = writeln!(
                    out,
                    "  {:>3}  {}  [{}]",
                    update.new_score,
                    update.address,
                    Tier::from_score(update.new_score).label()
                );
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScoreUpdate;
    use std::time::Duration;

    fn outcome(scores: &[i32]) -> ScoringOutcome {
        ScoringOutcome {
            updates: scores
                .iter()
                .enumerate()
                .map(|(i, &score)| ScoreUpdate {
                    address: format!("0x{i:040x}"),
                    old_score: None,
                    new_score: score,
                })
                .collect(),
            skipped: 0,
            elapsed: Duration::from_secs(1),
        }
    }

    #[test]
    fn distribution_counts_band_edges() {
        let distribution =
            TierDistribution::from_outcome(&outcome(&[100, 80, 79, 50, 49, 20, 19, 0]));
        assert_eq!(
            distribution,
            TierDistribution { high: 2, medium: 2, low: 2, minimal: 2 }
        );
    }

    #[test]
    fn report_lists_extremes() {
        let scores: Vec<i32> = (0..20).map(|i| i * 5).collect();
        let rendered = render(&outcome(&scores));
        assert!(rendered.contains("Scored 20 wallets"));
        assert!(rendered.contains("Top wallets:"));
        assert!(rendered.contains("Bottom wallets:"));
        assert!(rendered.contains("95"));
    }
}
