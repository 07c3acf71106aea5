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

//! Row models and the small enums stored as TEXT columns.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

/// Where a wallet was first observed. The transition to [`Source::Both`]
/// is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Seen through the ERC-8004 identity registry.
    Erc8004,
    /// Seen through x402 payment settlement.
    X402,
    /// Seen through both event families.
    Both,
}

impl Source {
    /// Stored TEXT representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Erc8004 => "erc8004",
            Self::X402 => "x402",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "erc8004" => Ok(Self::Erc8004),
            "x402" => Ok(Self::X402),
            "both" => Ok(Self::Both),
            other => Err(eyre::eyre!("unknown wallet source: {other}")),
        }
    }
}

/// Which side of payments a wallet has been on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Only ever a payer.
    Buyer,
    /// Only ever a recipient.
    Seller,
    /// Both payer and recipient.
    Both,
}

impl Role {
    /// Stored TEXT representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
            Self::Both => "both",
        }
    }
}

/// Provenance of a feedback row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackSource {
    /// Decoded from a registry event.
    Chain,
    /// Submitted through the write API.
    Api,
}

impl FeedbackSource {
    /// Stored TEXT representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chain => "chain",
            Self::Api => "api",
        }
    }
}

/// Webhook trigger kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    /// Any non-zero delta.
    ScoreChange,
    /// Negative delta only.
    ScoreDrop,
    /// Positive delta only.
    ScoreRise,
}

impl WebhookEvent {
    /// Stored TEXT representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScoreChange => "score_change",
            Self::ScoreDrop => "score_drop",
            Self::ScoreRise => "score_rise",
        }
    }
}

impl FromStr for WebhookEvent {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "score_change" => Ok(Self::ScoreChange),
            "score_drop" => Ok(Self::ScoreDrop),
            "score_rise" => Ok(Self::ScoreRise),
            other => Err(eyre::eyre!("unknown webhook event type: {other}")),
        }
    }
}

/// One row of `wallets`.
#[derive(Debug, Clone, FromRow)]
pub struct WalletRow {
    /// Lowercased 20-byte address.
    pub address: String,
    /// See [`Source`]; TEXT in the database.
    pub source: String,
    /// Chain of first observation.
    pub chain: String,
    /// ERC-8004 identity token, if registered.
    pub erc8004_id: Option<i64>,
    /// Observed transaction count.
    pub tx_count: i64,
    /// First observation; never decreases.
    pub first_seen_at: DateTime<Utc>,
    /// Latest observation; monotonically non-decreasing.
    pub last_seen_at: DateTime<Utc>,
    /// Current trust score in [0, 100], if scored.
    pub trust_score: Option<i32>,
    /// Per-signal breakdown of the current score.
    pub score_breakdown: Option<serde_json::Value>,
    /// When the current score was computed.
    pub scored_at: Option<DateTime<Utc>>,
    /// See [`Role`]; TEXT in the database.
    pub role: Option<String>,
    /// Dirty flag cleared by the scoring engine.
    pub needs_rescore: bool,
}

/// One row of `webhooks`.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookRow {
    /// Registration id.
    pub id: i64,
    /// Owning API key.
    pub api_key_id: i64,
    /// Delivery target.
    pub url: String,
    /// Optional wallet filter (lowercased address).
    pub wallet_address: Option<String>,
    /// See [`WebhookEvent`]; TEXT in the database.
    pub event_type: String,
    /// Optional crossing threshold.
    pub threshold: Option<i32>,
    /// Disabled webhooks are skipped until an operator re-enables them.
    pub active: bool,
    /// Consecutive delivery failures.
    pub consecutive_failures: i32,
}

impl WebhookRow {
    /// Parsed trigger kind.
    pub fn event(&self) -> eyre::Result<WebhookEvent> {
        self.event_type.parse()
    }
}

/// A decoded payment ready for insertion.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Settlement transaction hash.
    pub tx_hash: String,
    /// Chain short name.
    pub chain: String,
    /// Block the settlement landed in.
    pub block_number: i64,
    /// ERC-3009 authorizer, when one was matched.
    pub authorizer: Option<String>,
    /// Token sender.
    pub payer: Option<String>,
    /// Token receiver.
    pub recipient: Option<String>,
    /// Full-precision amount in base units, as text.
    pub amount_raw: String,
    /// Amount scaled to 6 fractional digits.
    pub amount_usdc: BigDecimal,
    /// Gas-paying sender of the settlement transaction.
    pub facilitator: Option<String>,
    /// Whether the facilitator is a known x402 settler.
    pub is_x402: bool,
    /// Estimated timestamp of the block.
    pub block_timestamp: DateTime<Utc>,
}

/// A decoded feedback attestation ready for insertion.
#[derive(Debug, Clone)]
pub struct NewFeedback {
    /// Transaction that emitted the event.
    pub tx_hash: String,
    /// Log index within the transaction; part of the unique key.
    pub feedback_index: i64,
    /// Subject agent identity.
    pub agent_id: i64,
    /// Submitting address.
    pub client_address: String,
    /// Signed fixed-point value, unscaled.
    pub value: BigDecimal,
    /// Number of fractional digits in `value`.
    pub value_decimals: i16,
    /// First optional tag.
    pub tag1: Option<String>,
    /// Second optional tag.
    pub tag2: Option<String>,
    /// Endpoint the feedback refers to.
    pub endpoint: Option<String>,
    /// Off-chain feedback document.
    pub feedback_uri: Option<String>,
    /// 32-byte content hash of the document, hex-encoded.
    pub content_hash: Option<String>,
    /// Block the event landed in.
    pub block_number: i64,
    /// Estimated timestamp of the block.
    pub block_timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trips() {
        for source in [Source::Erc8004, Source::X402, Source::Both] {
            assert_eq!(source.as_str().parse::<Source>().unwrap(), source);
        }
    }

    #[test]
    fn webhook_event_round_trips() {
        for event in
            [WebhookEvent::ScoreChange, WebhookEvent::ScoreDrop, WebhookEvent::ScoreRise]
        {
            assert_eq!(event.as_str().parse::<WebhookEvent>().unwrap(), event);
        }
    }

    #[test]
    fn webhook_event_serializes_as_snake_case() {
        let json = serde_json::to_string(&WebhookEvent::ScoreDrop).unwrap();
        assert_eq!(json, "\"score_drop\"");
    }
}
