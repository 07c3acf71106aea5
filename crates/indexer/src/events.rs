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

//! Event declarations and raw-log decoding.
//!
//! Three contracts feed the pipeline: the ERC-8004 identity registry
//! (ERC-721 mints), the ERC-8004 reputation registry (`NewFeedback`), and
//! the chain's USDC contract (`Transfer` + ERC-3009 `AuthorizationUsed`).
//! Malformed logs yield errors the scanners log and skip; a bad log never
//! kills a batch.

use crate::gateway::LogRecord;
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolEvent;
use bigdecimal::{
    num_bigint::{BigInt, Sign},
    BigDecimal,
};
use eyre::{bail, Result};

mod sol_defs {
    #![allow(missing_docs)]

    // The registry mint carries three indexed topics (ERC-721 layout).
    pub(super) mod erc721 {
        alloy_sol_types::sol! {
            event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
        }
    }

    // USDC's Transfer indexes only the parties (ERC-20 layout).
    pub(super) mod erc20 {
        alloy_sol_types::sol! {
            event Transfer(address indexed from, address indexed to, uint256 value);
            event AuthorizationUsed(address indexed authorizer, bytes32 indexed nonce);
        }
    }

    pub(super) mod reputation {
        alloy_sol_types::sol! {
            event NewFeedback(
                uint256 indexed agentId,
                address indexed clientAddress,
                int128 value,
                uint8 valueDecimals,
                string tag1,
                string tag2,
                string endpoint,
                string feedbackUri,
                bytes32 contentHash
            );
        }
    }
}

/// keccak256 of `Transfer(address,address,uint256)`; shared by the ERC-20
/// and ERC-721 layouts.
pub const TRANSFER_TOPIC: B256 = sol_defs::erc20::Transfer::SIGNATURE_HASH;

/// keccak256 of `AuthorizationUsed(address,bytes32)`.
pub const AUTHORIZATION_USED_TOPIC: B256 = sol_defs::erc20::AuthorizationUsed::SIGNATURE_HASH;

/// keccak256 of the reputation registry's `NewFeedback` signature.
pub const NEW_FEEDBACK_TOPIC: B256 = sol_defs::reputation::NewFeedback::SIGNATURE_HASH;

/// USDC carries 6 decimals on every supported chain.
pub const USDC_DECIMALS: i64 = 6;

/// A registry mint: one freshly issued agent identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityMint {
    /// Wallet the identity token was minted to.
    pub owner: Address,
    /// The token id, i.e. the agent's `erc8004_id`.
    pub token_id: i64,
}

/// A decoded USDC transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsdcTransfer {
    /// Token sender.
    pub payer: Address,
    /// Token receiver.
    pub recipient: Address,
    /// Amount in base units (6 decimals).
    pub amount: U256,
}

/// A decoded `NewFeedback` attestation.
#[derive(Debug, Clone)]
pub struct FeedbackEvent {
    /// Subject agent identity.
    pub agent_id: i64,
    /// Submitting address.
    pub client_address: Address,
    /// Signed fixed-point value, unscaled.
    pub value: i128,
    /// Fractional digits of `value`.
    pub value_decimals: u8,
    /// First optional tag; empty string decodes to `None`.
    pub tag1: Option<String>,
    /// Second optional tag.
    pub tag2: Option<String>,
    /// Endpoint the feedback refers to.
    pub endpoint: Option<String>,
    /// Off-chain feedback document.
    pub feedback_uri: Option<String>,
    /// Content hash of the document.
    pub content_hash: B256,
}

/// Decode an identity-registry mint: a `Transfer` from the zero address.
pub fn decode_identity_mint(log: &LogRecord) -> Result<IdentityMint> {
    let [topic0, from, to, token_id] = log.topics.as_slice() else {
        bail!("identity Transfer log has {} topics, expected 4", log.topics.len());
    };
    if *topic0 != TRANSFER_TOPIC {
        bail!("unexpected topic0 for identity Transfer: {topic0}");
    }
    if topic_address(*from) != Address::ZERO {
        bail!("identity Transfer is not a mint (from != 0x0)");
    }

    let token_id = U256::from_be_bytes(token_id.0);
    let token_id = i64::try_from(token_id).map_err(|_| {
        eyre::eyre!("identity token id {token_id} does not fit the registry id range")
    })?;

    Ok(IdentityMint { owner: topic_address(*to), token_id })
}

/// Decode an ERC-20 USDC `Transfer` (two indexed topics, amount in data).
pub fn decode_usdc_transfer(log: &LogRecord) -> Result<UsdcTransfer> {
    let [topic0, from, to] = log.topics.as_slice() else {
        bail!("USDC Transfer log has {} topics, expected 3", log.topics.len());
    };
    if *topic0 != TRANSFER_TOPIC {
        bail!("unexpected topic0 for USDC Transfer: {topic0}");
    }
    if log.data.len() != 32 {
        bail!("USDC Transfer data is {} bytes, expected 32", log.data.len());
    }

    let mut word = [0u8; 32];
    word.copy_from_slice(&log.data);

    Ok(UsdcTransfer {
        payer: topic_address(*from),
        recipient: topic_address(*to),
        amount: U256::from_be_bytes(word),
    })
}

/// Decode the authorizer out of an ERC-3009 `AuthorizationUsed` log.
pub fn decode_authorization_used(log: &LogRecord) -> Result<Address> {
    let [topic0, authorizer, _nonce] = log.topics.as_slice() else {
        bail!("AuthorizationUsed log has {} topics, expected 3", log.topics.len());
    };
    if *topic0 != AUTHORIZATION_USED_TOPIC {
        bail!("unexpected topic0 for AuthorizationUsed: {topic0}");
    }
    Ok(topic_address(*authorizer))
}

/// Decode a full `NewFeedback` payload, variable-width tags included.
pub fn decode_new_feedback(log: &LogRecord) -> Result<FeedbackEvent> {
    let decoded = sol_defs::reputation::NewFeedback::decode_raw_log(
        log.topics.iter().copied(),
        &log.data,
    )
    .map_err(|e| eyre::eyre!("malformed NewFeedback payload: {e}"))?;

    let agent_id = i64::try_from(decoded.agentId)
        .map_err(|_| eyre::eyre!("agent id {} does not fit the registry id range", decoded.agentId))?;

    Ok(FeedbackEvent {
        agent_id,
        client_address: decoded.clientAddress,
        value: decoded.value,
        value_decimals: decoded.valueDecimals,
        tag1: non_empty(decoded.tag1),
        tag2: non_empty(decoded.tag2),
        endpoint: non_empty(decoded.endpoint),
        feedback_uri: non_empty(decoded.feedbackUri),
        content_hash: decoded.contentHash,
    })
}

/// Scale a base-unit USDC amount to its decimal representation.
///
/// Returns the full-precision raw amount as text alongside the scaled
/// 6-fractional-digit decimal, both exact.
pub fn usdc_amount(amount: U256) -> (String, BigDecimal) {
    let digits = BigInt::from_bytes_be(Sign::Plus, &amount.to_be_bytes::<32>());
    (amount.to_string(), BigDecimal::new(digits, USDC_DECIMALS))
}

/// The address packed into an indexed topic.
pub fn topic_address(topic: B256) -> Address {
    Address::from_slice(&topic[12..])
}

/// Canonical lowercased `0x`-prefixed form, as stored in the database.
pub fn format_address(address: Address) -> String {
    format!("{address:#x}")
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, Bytes};

    fn log(topics: Vec<B256>, data: Vec<u8>) -> LogRecord {
        LogRecord {
            address: Address::ZERO,
            topics,
            data: Bytes::from(data),
            block_number: None,
            transaction_hash: None,
            log_index: None,
        }
    }

    fn address_topic(address: Address) -> B256 {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(address.as_slice());
        B256::from(word)
    }

    #[test]
    fn transfer_topic_matches_the_canonical_hash() {
        assert_eq!(
            TRANSFER_TOPIC,
            b256!("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef")
        );
    }

    #[test]
    fn decodes_identity_mint() {
        let owner = address!("0x1111111111111111111111111111111111111111");
        let mut token_id = [0u8; 32];
        token_id[31] = 42;

        let record = log(
            vec![TRANSFER_TOPIC, address_topic(Address::ZERO), address_topic(owner), B256::from(token_id)],
            vec![],
        );

        let mint = decode_identity_mint(&record).unwrap();
        assert_eq!(mint.owner, owner);
        assert_eq!(mint.token_id, 42);
    }

    #[test]
    fn rejects_non_mint_transfer() {
        let from = address!("0x2222222222222222222222222222222222222222");
        let to = address!("0x1111111111111111111111111111111111111111");
        let record = log(
            vec![TRANSFER_TOPIC, address_topic(from), address_topic(to), B256::ZERO],
            vec![],
        );
        assert!(decode_identity_mint(&record).is_err());
    }

    #[test]
    fn decodes_usdc_transfer_and_scales_amount() {
        let payer = address!("0x3333333333333333333333333333333333333333");
        let recipient = address!("0x4444444444444444444444444444444444444444");

        // 1,000,000 base units = exactly 1 USDC.
        let mut data = vec![0u8; 32];
        data[29] = 0x0f;
        data[30] = 0x42;
        data[31] = 0x40;

        let record = log(
            vec![TRANSFER_TOPIC, address_topic(payer), address_topic(recipient)],
            data,
        );

        let transfer = decode_usdc_transfer(&record).unwrap();
        assert_eq!(transfer.payer, payer);
        assert_eq!(transfer.recipient, recipient);
        assert_eq!(transfer.amount, U256::from(1_000_000u64));

        let (raw, scaled) = usdc_amount(transfer.amount);
        assert_eq!(raw, "1000000");
        assert_eq!(scaled.to_string(), "1.000000");
    }

    #[test]
    fn rejects_erc721_shaped_transfer_as_usdc() {
        // Three indexed params means it is a registry mint, not an ERC-20
        // transfer; the payment scanner must not mistake one for the other.
        let record = log(
            vec![TRANSFER_TOPIC, B256::ZERO, B256::ZERO, B256::ZERO],
            vec![],
        );
        assert!(decode_usdc_transfer(&record).is_err());
    }

    #[test]
    fn decodes_authorization_used() {
        let authorizer = address!("0x5555555555555555555555555555555555555555");
        let record = log(
            vec![AUTHORIZATION_USED_TOPIC, address_topic(authorizer), B256::repeat_byte(0xab)],
            vec![],
        );
        assert_eq!(decode_authorization_used(&record).unwrap(), authorizer);
    }

    #[test]
    fn decodes_new_feedback_with_dynamic_fields() {
        let client = address!("0x6666666666666666666666666666666666666666");
        let content_hash = B256::repeat_byte(0xcd);

        let mut agent_topic = [0u8; 32];
        agent_topic[31] = 7;

        let data = encode_feedback_data(450, 2, "fast", "", "api/chat", "ipfs://feedback", content_hash);
        let record = log(
            vec![NEW_FEEDBACK_TOPIC, B256::from(agent_topic), address_topic(client)],
            data,
        );

        let feedback = decode_new_feedback(&record).unwrap();
        assert_eq!(feedback.agent_id, 7);
        assert_eq!(feedback.client_address, client);
        assert_eq!(feedback.value, 450);
        assert_eq!(feedback.value_decimals, 2);
        assert_eq!(feedback.tag1.as_deref(), Some("fast"));
        assert_eq!(feedback.tag2, None);
        assert_eq!(feedback.endpoint.as_deref(), Some("api/chat"));
        assert_eq!(feedback.feedback_uri.as_deref(), Some("ipfs://feedback"));
        assert_eq!(feedback.content_hash, content_hash);
    }

    #[test]
    fn negative_feedback_values_survive_decoding() {
        let client = address!("0x6666666666666666666666666666666666666666");
        let data = encode_feedback_data(-125, 2, "", "", "", "", B256::ZERO);
        let record = log(
            vec![NEW_FEEDBACK_TOPIC, B256::ZERO, address_topic(client)],
            data,
        );

        let feedback = decode_new_feedback(&record).unwrap();
        assert_eq!(feedback.value, -125);
        assert_eq!(feedback.tag1, None);
    }

    /// ABI-encode the non-indexed NewFeedback fields by hand: two value
    /// words, four dynamic-string offsets, the content hash word, then the
    /// string tails.
    fn encode_feedback_data(
        value: i128,
        decimals: u8,
        tag1: &str,
        tag2: &str,
        endpoint: &str,
        uri: &str,
        content_hash: B256,
    ) -> Vec<u8> {
        fn word_i128(value: i128) -> [u8; 32] {
            let mut word = if value < 0 { [0xffu8; 32] } else { [0u8; 32] };
            word[16..].copy_from_slice(&value.to_be_bytes());
            word
        }
        fn word_u64(value: u64) -> [u8; 32] {
            let mut word = [0u8; 32];
            word[24..].copy_from_slice(&value.to_be_bytes());
            word
        }
        fn string_tail(value: &str) -> Vec<u8> {
            let mut tail = word_u64(value.len() as u64).to_vec();
            tail.extend_from_slice(value.as_bytes());
            let padding = (32 - value.len() % 32) % 32;
            tail.extend(std::iter::repeat(0u8).take(padding));
            tail
        }

        let strings = [tag1, tag2, endpoint, uri];
        let head_words = 7u64;
        let mut offsets = Vec::new();
        let mut tails: Vec<u8> = Vec::new();
        for s in strings {
            offsets.push(head_words * 32 + tails.len() as u64);
            tails.extend(string_tail(s));
        }

        let mut data = Vec::new();
        data.extend_from_slice(&word_i128(value));
        data.extend_from_slice(&word_u64(decimals as u64));
        for offset in offsets {
            data.extend_from_slice(&word_u64(offset));
        }
        data.extend_from_slice(content_hash.as_slice());
        data.extend_from_slice(&tails);
        data
    }
}
