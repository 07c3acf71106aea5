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

//! Webhook payloads and the bounded-retry POST.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Delivery attempts per payload, including the first.
const MAX_ATTEMPTS: usize = 3;

/// Backoff schedule between attempts, in seconds.
const BACKOFF_SECS: [u64; 3] = [1, 2, 4];

/// Per-delivery timeout.
pub(crate) const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// The JSON body a matched webhook receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Which trigger matched (`score_change` / `score_drop` / `score_rise`).
    pub event: String,
    /// Wallet address, lowercased.
    pub address: String,
    /// Score before the pass; absent for a first-ever score.
    pub old_score: Option<i32>,
    /// Score after the pass.
    pub new_score: i32,
    /// Tier label of the new score.
    pub tier: String,
    /// The webhook's configured threshold, echoed back.
    pub threshold: Option<i32>,
    /// Delivery timestamp; with `address`, a sufficient dedupe key.
    pub timestamp: DateTime<Utc>,
}

/// POST `payload` to `url`, retrying transport failures and non-2xx
/// responses on the backoff schedule. Returns `Err` with the final reason
/// after the last attempt.
pub(crate) async fn deliver(
    client: &reqwest::Client,
    url: &str,
    payload: &WebhookPayload,
) -> Result<(), String> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let failure = match client.post(url).json(payload).send().await {
            Ok(response) if response.status().is_success() => return Ok(()),
            Ok(response) => format!("http {}", response.status()),
            Err(err) => err.to_string(),
        };

        if attempt >= MAX_ATTEMPTS {
            return Err(failure);
        }

        let delay = BACKOFF_SECS[(attempt - 1).min(BACKOFF_SECS.len() - 1)];
        warn!(url, attempt, delay_secs = delay, %failure, "webhook delivery failed, backing off");
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_partial_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn payload() -> WebhookPayload {
        WebhookPayload {
            event: "score_drop".into(),
            address: "0x00000000000000000000000000000000000000aa".into(),
            old_score: Some(85),
            new_score: 49,
            tier: "LOW".into(),
            threshold: Some(50),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivers_the_contract_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({
                "event": "score_drop",
                "address": "0x00000000000000000000000000000000000000aa",
                "old_score": 85,
                "new_score": 49,
                "tier": "LOW",
                "threshold": 50
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        deliver(&client, &format!("{}/hook", server.uri()), &payload()).await.unwrap();
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        deliver(&client, &format!("{}/hook", server.uri()), &payload()).await.unwrap();
    }

    #[tokio::test]
    async fn gives_up_after_three_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = deliver(&client, &format!("{}/hook", server.uri()), &payload())
            .await
            .unwrap_err();
        assert!(err.contains("500"));
    }
}
