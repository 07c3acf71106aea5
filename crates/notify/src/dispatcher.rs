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

//! Matching score deltas against webhook registrations.

use crate::delivery::{self, WebhookPayload, DELIVERY_TIMEOUT};
use chrono::Utc;
use eyre::Result;
use karma_scoring::{ScoreUpdate, Tier};
use karma_store::{Store, WebhookEvent, WebhookRow};
use tracing::{info, warn};

/// Consecutive delivery failures after which a webhook is disabled until
/// an operator re-enables it.
pub const DISABLE_AFTER_FAILURES: i32 = 10;

/// Totals for one dispatch run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchSummary {
    /// (update, webhook) pairs that matched.
    pub matched: u64,
    /// Payloads delivered with a 2xx response.
    pub delivered: u64,
    /// Payloads that exhausted their retries.
    pub failed: u64,
    /// Webhooks disabled by their failure streak this run.
    pub disabled: u64,
}

/// Matches a scoring pass's deltas against registrations and delivers.
#[derive(Debug)]
pub struct Dispatcher {
    store: Store,
    client: reqwest::Client,
}

impl Dispatcher {
    /// Create a dispatcher over the shared store.
    pub fn new(store: Store) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(DELIVERY_TIMEOUT).build()?;
        Ok(Self { store, client })
    }

    /// Deliver notifications for one completed scoring pass.
    ///
    /// Webhooks with an unparseable event type are skipped with a warning;
    /// delivery failures feed the per-webhook failure streak.
    pub async fn dispatch(&self, updates: &[ScoreUpdate]) -> Result<DispatchSummary> {
        let webhooks = self.store.active_webhooks().await?;
        let mut summary = DispatchSummary::default();

        if webhooks.is_empty() || updates.is_empty() {
            return Ok(summary);
        }

        for update in updates {
            for webhook in &webhooks {
                let event = match webhook.event() {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(webhook = webhook.id, error = %err, "skipping malformed webhook row");
                        continue;
                    }
                };
                if !matches(webhook, event, update) {
                    continue;
                }
                summary.matched += 1;

                let payload = WebhookPayload {
                    event: event.as_str().to_string(),
                    address: update.address.clone(),
                    old_score: update.old_score,
                    new_score: update.new_score,
                    tier: Tier::from_score(update.new_score).label().to_string(),
                    threshold: webhook.threshold,
                    timestamp: Utc::now(),
                };

                match delivery::deliver(&self.client, &webhook.url, &payload).await {
                    Ok(()) => {
                        summary.delivered += 1;
                        self.store.webhook_delivered(webhook.id).await?;
                    }
                    Err(reason) => {
                        summary.failed += 1;
                        warn!(webhook = webhook.id, url = %webhook.url, %reason, "webhook delivery exhausted retries");
                        let failures = self.store.webhook_delivery_failed(webhook.id).await?;
                        if failures >= DISABLE_AFTER_FAILURES {
                            warn!(webhook = webhook.id, failures, "disabling webhook after persistent failures");
                            self.store.disable_webhook(webhook.id).await?;
                            summary.disabled += 1;
                        }
                    }
                }
            }
        }

        info!(
            matched = summary.matched,
            delivered = summary.delivered,
            failed = summary.failed,
            disabled = summary.disabled,
            "dispatch finished"
        );
        Ok(summary)
    }
}

/// Does `webhook` match this delta?
///
/// Wallet filter first, then the event direction, then the threshold
/// crossing in the event's direction. A wallet with no previous score only
/// matches `score_change`, and a configured threshold is waived for it.
fn matches(webhook: &WebhookRow, event: WebhookEvent, update: &ScoreUpdate) -> bool {
    if let Some(filter) = &webhook.wallet_address {
        if !filter.eq_ignore_ascii_case(&update.address) {
            return false;
        }
    }

    let Some(old) = update.old_score else {
        return event == WebhookEvent::ScoreChange;
    };
    let new = update.new_score;
    let delta = new - old;

    let direction_ok = match event {
        WebhookEvent::ScoreChange => delta != 0,
        WebhookEvent::ScoreDrop => delta < 0,
        WebhookEvent::ScoreRise => delta > 0,
    };
    if !direction_ok {
        return false;
    }

    match webhook.threshold {
        None => true,
        Some(threshold) => match event {
            WebhookEvent::ScoreDrop => old >= threshold && new < threshold,
            WebhookEvent::ScoreRise => old <= threshold && new > threshold,
            WebhookEvent::ScoreChange => (old >= threshold) != (new >= threshold),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook(event: &str, wallet: Option<&str>, threshold: Option<i32>) -> WebhookRow {
        WebhookRow {
            id: 1,
            api_key_id: 1,
            url: "https://example.invalid/hook".into(),
            wallet_address: wallet.map(str::to_string),
            event_type: event.into(),
            threshold,
            active: true,
            consecutive_failures: 0,
        }
    }

    fn update(old: Option<i32>, new: i32) -> ScoreUpdate {
        ScoreUpdate {
            address: "0x00000000000000000000000000000000000000aa".into(),
            old_score: old,
            new_score: new,
        }
    }

    fn check(hook: &WebhookRow, upd: &ScoreUpdate) -> bool {
        matches(hook, hook.event().unwrap(), upd)
    }

    #[test]
    fn drop_through_threshold_delivers_rise_does_not() {
        let upd = update(Some(85), 49);
        assert!(check(&webhook("score_drop", None, Some(50)), &upd));
        assert!(!check(&webhook("score_rise", None, None), &upd));
    }

    #[test]
    fn threshold_requires_a_crossing_in_the_event_direction() {
        // Falls, but stays above the threshold.
        assert!(!check(&webhook("score_drop", None, Some(50)), &update(Some(85), 60)));
        // Already below; no crossing.
        assert!(!check(&webhook("score_drop", None, Some(50)), &update(Some(45), 30)));
        // Rise across the line.
        assert!(check(&webhook("score_rise", None, Some(50)), &update(Some(45), 55)));
        // Change matches a crossing in either direction.
        assert!(check(&webhook("score_change", None, Some(50)), &update(Some(45), 55)));
        assert!(check(&webhook("score_change", None, Some(50)), &update(Some(55), 45)));
        assert!(!check(&webhook("score_change", None, Some(50)), &update(Some(55), 60)));
    }

    #[test]
    fn wallet_filter_must_match() {
        let upd = update(Some(40), 60);
        let same = webhook("score_rise", Some("0x00000000000000000000000000000000000000AA"), None);
        let other = webhook("score_rise", Some("0x00000000000000000000000000000000000000bb"), None);
        assert!(check(&same, &upd));
        assert!(!check(&other, &upd));
    }

    #[test]
    fn first_score_only_fires_change() {
        let upd = update(None, 72);
        assert!(check(&webhook("score_change", None, None), &upd));
        assert!(check(&webhook("score_change", None, Some(50)), &upd));
        assert!(!check(&webhook("score_drop", None, None), &upd));
        assert!(!check(&webhook("score_rise", None, None), &upd));
    }

    #[test]
    fn unchanged_score_fires_nothing() {
        let upd = update(Some(60), 60);
        assert!(!check(&webhook("score_change", None, None), &upd));
        assert!(!check(&webhook("score_drop", None, None), &upd));
        assert!(!check(&webhook("score_rise", None, None), &upd));
    }
}
