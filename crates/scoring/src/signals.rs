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

//! The signal shapers and their weighted composition.
//!
//! Every shaper maps its raw signal into [0, 100]. The composed score is
//! the weighted sum over the *rounded* per-signal values, the same integers
//! that land in the persisted breakdown, so the breakdown always reproduces
//! the score it sits next to. Floating point is fine here; everything is
//! rounded to integers before persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weight of the loyalty signal.
pub const WEIGHT_LOYALTY: f64 = 0.30;
/// Weight of the activity signal.
pub const WEIGHT_ACTIVITY: f64 = 0.18;
/// Weight of the diversity signal.
pub const WEIGHT_DIVERSITY: f64 = 0.16;
/// Weight of the feedback signal.
pub const WEIGHT_FEEDBACK: f64 = 0.15;
/// Weight of the volume signal.
pub const WEIGHT_VOLUME: f64 = 0.10;
/// Weight of the recency signal.
pub const WEIGHT_RECENCY: f64 = 0.06;
/// Weight of the age signal.
pub const WEIGHT_AGE: f64 = 0.05;

/// All weights; must sum to exactly 1.0.
pub const WEIGHTS: [f64; 7] = [
    WEIGHT_LOYALTY,
    WEIGHT_ACTIVITY,
    WEIGHT_DIVERSITY,
    WEIGHT_FEEDBACK,
    WEIGHT_VOLUME,
    WEIGHT_RECENCY,
    WEIGHT_AGE,
];

/// Flat bonus for carrying an ERC-8004 identity.
pub const REGISTRATION_BONUS: i32 = 5;

/// Everything the shapers need for one wallet.
#[derive(Debug, Clone)]
pub struct SignalBundle {
    /// Observed transaction count.
    pub tx_count: i64,
    /// First observation.
    pub first_seen_at: DateTime<Utc>,
    /// Latest observation.
    pub last_seen_at: DateTime<Utc>,
    /// Distinct counterparties across both directions.
    pub unique_counterparties: i64,
    /// Mean feedback value on the 0..5 scale, when any exists.
    pub avg_feedback: Option<f64>,
    /// Number of feedback attestations.
    pub feedback_count: i64,
    /// Total USDC volume the wallet participated in.
    pub total_volume_usdc: f64,
    /// Distinct counterparties contributing to that volume.
    pub volume_counterparties: i64,
    /// Whether the wallet carries an `erc8004_id`.
    pub is_registered: bool,
}

/// The persisted per-signal breakdown. Field names are the wire contract;
/// every value is the rounded shaper output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Rounded loyalty shaper output.
    pub loyalty: i32,
    /// Rounded activity shaper output.
    pub activity: i32,
    /// Rounded diversity shaper output.
    pub diversity: i32,
    /// Rounded feedback shaper output.
    pub feedback: i32,
    /// Rounded volume shaper output.
    pub volume: i32,
    /// Rounded age shaper output.
    pub age: i32,
    /// Rounded recency shaper output.
    pub recency: i32,
    /// 5 when registered, 0 otherwise.
    pub registered_bonus: i32,
}

/// Human tier label for a score band. Derived by readers, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    /// Score ≥ 80.
    High,
    /// Score in [50, 80).
    Medium,
    /// Score in [20, 50).
    Low,
    /// Score in [0, 20).
    Minimal,
}

impl Tier {
    /// Classify a score.
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 80 => Self::High,
            s if s >= 50 => Self::Medium,
            s if s >= 20 => Self::Low,
            _ => Self::Minimal,
        }
    }

    /// The label the read API reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Minimal => "MINIMAL",
        }
    }
}

/// Log-shaped activity: rewards early transactions, saturates near 100 txns.
pub fn activity_score(tx_count: i64) -> f64 {
    if tx_count <= 0 {
        return 0.0;
    }
    clamp100(100.0 * ((tx_count as f64) + 1.0).log10() / 101f64.log10())
}

/// Log-shaped counterparty diversity, capped at 30 distinct counterparties.
pub fn diversity_score(counterparties: i64) -> f64 {
    if counterparties <= 0 {
        return 0.0;
    }
    clamp100(100.0 * ((counterparties as f64) + 1.0).log10() / 31f64.log10())
}

/// Repeat-business ratio with a Sybil shield.
///
/// Hyper-concentrated patterns (ratio above 20 against fewer than 3
/// counterparties) are capped at 40 however high the ratio goes.
pub fn loyalty_score(tx_count: i64, counterparties: i64) -> f64 {
    if tx_count <= 1 || counterparties == 0 {
        return 0.0;
    }
    let ratio = tx_count as f64 / counterparties as f64;
    let base = clamp100(100.0 * (ratio - 1.0) / 4.0);
    if ratio > 20.0 && counterparties < 3 {
        base.min(40.0)
    } else {
        base
    }
}

/// Confidence-weighted feedback: pulls toward the neutral 50 until ten
/// attestations exist, so one review can't produce an extreme.
pub fn feedback_score(avg_feedback: Option<f64>, feedback_count: i64) -> f64 {
    let Some(avg) = avg_feedback else {
        return 50.0;
    };
    if feedback_count <= 0 {
        return 50.0;
    }
    let raw = clamp100(avg / 5.0 * 100.0);
    let confidence = (feedback_count as f64 / 10.0).min(1.0);
    confidence * raw + (1.0 - confidence) * 50.0
}

/// Log-shaped average deal size; neutral 50 without volume data.
pub fn volume_score(total_volume_usdc: f64, volume_counterparties: i64) -> f64 {
    if total_volume_usdc <= 0.0 || volume_counterparties <= 0 {
        return 50.0;
    }
    let deal_size = total_volume_usdc / volume_counterparties as f64;
    clamp100(100.0 * (deal_size + 1.0).log10() / 10_001f64.log10())
}

/// Log-shaped account age in days; the first days matter most.
pub fn age_score(days_since_first_seen: f64) -> f64 {
    if !days_since_first_seen.is_finite() || days_since_first_seen < 0.0 {
        return 0.0;
    }
    clamp100(100.0 * (days_since_first_seen + 1.0).log10() / 181f64.log10())
}

/// Staleness penalty: full marks inside a week, zero beyond ninety days,
/// linear in between.
pub fn recency_score(days_since_last_seen: f64) -> f64 {
    if !days_since_last_seen.is_finite() {
        return 0.0;
    }
    if days_since_last_seen < 0.0 || days_since_last_seen <= 7.0 {
        return 100.0;
    }
    if days_since_last_seen >= 90.0 {
        return 0.0;
    }
    100.0 * (90.0 - days_since_last_seen) / 83.0
}

/// Shape every signal, compose the weighted score, apply the registration
/// bonus and the final clamp.
pub fn compose(bundle: &SignalBundle, now: DateTime<Utc>) -> (i32, ScoreBreakdown) {
    let age_days = (now - bundle.first_seen_at).num_seconds() as f64 / 86_400.0;
    let recency_days = (now - bundle.last_seen_at).num_seconds() as f64 / 86_400.0;

    let breakdown = ScoreBreakdown {
        loyalty: round(loyalty_score(bundle.tx_count, bundle.unique_counterparties)),
        activity: round(activity_score(bundle.tx_count)),
        diversity: round(diversity_score(bundle.unique_counterparties)),
        feedback: round(feedback_score(bundle.avg_feedback, bundle.feedback_count)),
        volume: round(volume_score(bundle.total_volume_usdc, bundle.volume_counterparties)),
        age: round(age_score(age_days)),
        recency: round(recency_score(recency_days)),
        registered_bonus: if bundle.is_registered { REGISTRATION_BONUS } else { 0 },
    };

    let weighted = breakdown.loyalty as f64 * WEIGHT_LOYALTY
        + breakdown.activity as f64 * WEIGHT_ACTIVITY
        + breakdown.diversity as f64 * WEIGHT_DIVERSITY
        + breakdown.feedback as f64 * WEIGHT_FEEDBACK
        + breakdown.volume as f64 * WEIGHT_VOLUME
        + breakdown.recency as f64 * WEIGHT_RECENCY
        + breakdown.age as f64 * WEIGHT_AGE;

    let score = (weighted.round() as i32 + breakdown.registered_bonus).clamp(0, 100);
    (score, breakdown)
}

fn clamp100(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

fn round(value: f64) -> i32 {
    value.round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bundle() -> SignalBundle {
        let now = Utc::now();
        SignalBundle {
            tx_count: 10,
            first_seen_at: now - Duration::days(90),
            last_seen_at: now - Duration::days(1),
            unique_counterparties: 5,
            avg_feedback: Some(4.0),
            feedback_count: 10,
            total_volume_usdc: 1_000.0,
            volume_counterparties: 5,
            is_registered: false,
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let sum: f64 = WEIGHTS.iter().sum();
        assert_eq!((sum * 100.0).round() / 100.0, 1.0);
    }

    #[test]
    fn all_shapers_stay_in_bounds() {
        for tx in [0, 1, 2, 10, 100, 1_000, 1_000_000] {
            for cp in [0, 1, 2, 3, 10, 30, 100] {
                assert!((0.0..=100.0).contains(&activity_score(tx)));
                assert!((0.0..=100.0).contains(&diversity_score(cp)));
                assert!((0.0..=100.0).contains(&loyalty_score(tx, cp)));
            }
        }
        for avg in [None, Some(-3.0), Some(0.0), Some(2.5), Some(5.0), Some(50.0)] {
            for count in [0, 1, 5, 10, 100] {
                assert!((0.0..=100.0).contains(&feedback_score(avg, count)));
            }
        }
        for volume in [-5.0, 0.0, 1.0, 1_000.0, 1e12] {
            for cp in [0, 1, 5, 100] {
                assert!((0.0..=100.0).contains(&volume_score(volume, cp)));
            }
        }
        for days in [f64::NAN, -10.0, 0.0, 0.5, 7.0, 45.0, 90.0, 10_000.0] {
            assert!((0.0..=100.0).contains(&age_score(days)));
            assert!((0.0..=100.0).contains(&recency_score(days)));
        }
    }

    #[test]
    fn activity_diversity_age_are_monotone_non_decreasing() {
        let mut last = 0.0;
        for tx in 0..500 {
            let score = activity_score(tx);
            assert!(score >= last);
            last = score;
        }
        let mut last = 0.0;
        for cp in 0..100 {
            let score = diversity_score(cp);
            assert!(score >= last);
            last = score;
        }
        let mut last = 0.0;
        for days in 0..400 {
            let score = age_score(days as f64);
            assert!(score >= last);
            last = score;
        }
    }

    #[test]
    fn recency_is_monotone_non_increasing() {
        let mut last = 100.0;
        for tenth in 0..1_000 {
            let score = recency_score(tenth as f64 / 10.0);
            assert!(score <= last);
            last = score;
        }
    }

    #[test]
    fn age_log_curve() {
        assert_eq!(round(age_score(0.0)), 0);
        assert_eq!(round(age_score(10.0)), 46);
        assert_eq!(round(age_score(90.0)), 87);
        assert_eq!(round(age_score(180.0)), 100);
        assert_eq!(round(age_score(365.0)), 100);
    }

    #[test]
    fn loyalty_sybil_cap() {
        assert!(loyalty_score(100, 2) <= 40.0);
        assert_eq!(loyalty_score(60, 3), 100.0);
        assert_eq!(loyalty_score(50, 10), 100.0);
        assert_eq!(loyalty_score(10, 5), 25.0);
        // Single transactions and orphan wallets score zero.
        assert_eq!(loyalty_score(1, 1), 0.0);
        assert_eq!(loyalty_score(10, 0), 0.0);
    }

    #[test]
    fn feedback_confidence_weighting() {
        assert_eq!(feedback_score(Some(5.0), 1), 55.0);
        assert_eq!(feedback_score(Some(5.0), 10), 100.0);
        assert_eq!(feedback_score(None, 0), 50.0);
        assert_eq!(feedback_score(Some(0.0), 10), 0.0);
    }

    #[test]
    fn volume_neutral_without_data() {
        assert_eq!(volume_score(0.0, 5), 50.0);
        assert_eq!(volume_score(1_000.0, 0), 50.0);
        // Average deal size of 200 on the log curve to 10,000.
        assert_eq!(round(volume_score(1_000.0, 5)), 58);
    }

    #[test]
    fn recency_window() {
        assert_eq!(recency_score(-1.0), 100.0);
        assert_eq!(recency_score(0.0), 100.0);
        assert_eq!(recency_score(7.0), 100.0);
        assert_eq!(recency_score(90.0), 0.0);
        assert_eq!(recency_score(120.0), 0.0);
        let mid = recency_score(48.5); // halfway through the 83-day window
        assert!((mid - 50.0).abs() < 1.0);
    }

    #[test]
    fn full_composition_example() {
        let (score, breakdown) = compose(&bundle(), Utc::now());
        assert_eq!(breakdown.loyalty, 25);
        assert_eq!(breakdown.activity, 52);
        assert_eq!(breakdown.diversity, 52);
        assert_eq!(breakdown.feedback, 80);
        assert_eq!(breakdown.volume, 58);
        assert_eq!(breakdown.age, 87);
        assert_eq!(breakdown.recency, 100);
        assert_eq!(breakdown.registered_bonus, 0);
        assert_eq!(score, 53);
    }

    #[test]
    fn breakdown_weighted_sum_reproduces_the_score() {
        let (score, b) = compose(&bundle(), Utc::now());
        let weighted = b.loyalty as f64 * WEIGHT_LOYALTY
            + b.activity as f64 * WEIGHT_ACTIVITY
            + b.diversity as f64 * WEIGHT_DIVERSITY
            + b.feedback as f64 * WEIGHT_FEEDBACK
            + b.volume as f64 * WEIGHT_VOLUME
            + b.recency as f64 * WEIGHT_RECENCY
            + b.age as f64 * WEIGHT_AGE;
        assert_eq!((weighted.round() as i32 + b.registered_bonus).clamp(0, 100), score);
    }

    #[test]
    fn registration_bonus_clamps_at_one_hundred() {
        let now = Utc::now();
        let maxed = SignalBundle {
            tx_count: 1_000,
            first_seen_at: now - Duration::days(200),
            last_seen_at: now,
            unique_counterparties: 30,
            avg_feedback: Some(5.0),
            feedback_count: 50,
            total_volume_usdc: 300_000.0,
            volume_counterparties: 30,
            is_registered: true,
        };
        let (score, breakdown) = compose(&maxed, now);
        assert_eq!(breakdown.registered_bonus, 5);
        assert_eq!(score, 100);
    }

    #[test]
    fn breakdown_serializes_with_the_contract_keys() {
        let (_, breakdown) = compose(&bundle(), Utc::now());
        let value = serde_json::to_value(breakdown).unwrap();
        let map = value.as_object().unwrap();
        for key in
            ["loyalty", "activity", "diversity", "feedback", "volume", "age", "recency", "registered_bonus"]
        {
            assert!(map.contains_key(key), "missing breakdown key {key}");
        }
        assert_eq!(map.len(), 8);
    }

    #[test]
    fn tier_bands() {
        assert_eq!(Tier::from_score(100), Tier::High);
        assert_eq!(Tier::from_score(80), Tier::High);
        assert_eq!(Tier::from_score(79), Tier::Medium);
        assert_eq!(Tier::from_score(50), Tier::Medium);
        assert_eq!(Tier::from_score(49), Tier::Low);
        assert_eq!(Tier::from_score(20), Tier::Low);
        assert_eq!(Tier::from_score(19), Tier::Minimal);
        assert_eq!(Tier::from_score(0), Tier::Minimal);
        assert_eq!(Tier::High.label(), "HIGH");
    }
}
