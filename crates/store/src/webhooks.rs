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

//! Webhook registrations and delivery bookkeeping.
//!
//! Registrations are written by the (out-of-tree) API; the dispatcher only
//! reads them and maintains the delivery metadata.

use crate::{db::Store, models::WebhookRow};
use eyre::Result;

impl Store {
    /// All webhooks eligible for delivery.
    pub async fn active_webhooks(&self) -> Result<Vec<WebhookRow>> {
        Ok(sqlx::query_as::<_, WebhookRow>(
            "SELECT id, api_key_id, url, wallet_address, event_type, threshold, \
                    active, consecutive_failures \
             FROM webhooks WHERE active ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?)
    }

    /// Record a successful delivery: reset the failure streak.
    pub async fn webhook_delivered(&self, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE webhooks SET consecutive_failures = 0, last_delivery_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Record a failed delivery; returns the updated streak length.
    pub async fn webhook_delivery_failed(&self, id: i64) -> Result<i32> {
        let (failures,): (i32,) = sqlx::query_as(
            "UPDATE webhooks SET consecutive_failures = consecutive_failures + 1 \
             WHERE id = $1 RETURNING consecutive_failures",
        )
        .bind(id)
        .fetch_one(self.pool())
        .await?;
        Ok(failures)
    }

    /// Disable a webhook until an operator re-enables it.
    pub async fn disable_webhook(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE webhooks SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
