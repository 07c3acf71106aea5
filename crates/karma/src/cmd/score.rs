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

//! `karma score`: one aggregation-and-scoring pass, then dispatch.

use eyre::Result;
use karma_common::Config;
use karma_notify::Dispatcher;
use karma_scoring::{report, ScoringEngine};
use karma_store::Store;

pub(crate) async fn run(config: &Config, full: bool, skip_webhooks: bool) -> Result<()> {
    let store = Store::connect(&config.database_url).await?;

    let engine = ScoringEngine::new(store.clone());
    let outcome = engine.run_pass(full).await?;

    print!("{}", report::render(&outcome));
    let total = store.wallet_count().await?;
    println!("Tracked wallets: {total}");

    if skip_webhooks {
        return Ok(());
    }

    // The dispatcher runs strictly after the completed pass.
    let dispatcher = Dispatcher::new(store)?;
    let dispatch = dispatcher.dispatch(&outcome.updates).await?;
    println!(
        "Webhooks: {} matched, {} delivered, {} failed, {} disabled",
        dispatch.matched, dispatch.delivered, dispatch.failed, dispatch.disabled
    );

    Ok(())
}
