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

//! Score-change notifications.
//!
//! Runs strictly after a completed scoring pass: each delta from the pass
//! is matched against the registered webhooks and matched payloads are
//! POSTed with bounded retries. Delivery is at-least-once; receivers
//! dedupe on (address, timestamp).

pub mod delivery;
pub mod dispatcher;

pub use delivery::WebhookPayload;
pub use dispatcher::{DispatchSummary, Dispatcher};
