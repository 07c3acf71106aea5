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

//! `karma index`: run every scanner the selected chains carry.

use super::human_bytes;
use eyre::Result;
use karma_common::{Chain, Config};
use karma_indexer::{scanners_for, BudgetGovernor, Gateway, ScanOptions, ScanOutcome, ScanSummary};
use karma_store::Store;
use std::{sync::Arc, time::Instant};
use tracing::info;

pub(crate) async fn run(config: &Config, chains: Vec<Chain>, opts: ScanOptions) -> Result<()> {
    let started = Instant::now();

    let store = Store::connect(&config.database_url).await?;
    let governor = Arc::new(BudgetGovernor::new(config.cu_budget));

    let mut summaries: Vec<ScanSummary> = Vec::new();

    'chains: for chain in chains {
        let chain_config = config.chain_config(chain)?;
        let gateway = Gateway::new(chain, chain_config.rpc_url.clone(), governor.clone())?;

        for scanner in scanners_for(&chain_config) {
            info!(scanner = scanner.id(), "starting scanner");
            let summary = scanner.run(&gateway, &store, &governor, &opts).await?;
            let budget_stopped = summary.outcome == ScanOutcome::BudgetStop;
            summaries.push(summary);

            if budget_stopped {
                // The flag is terminal for the whole process, not just
                // this scanner.
                break 'chains;
            }
        }
    }

    print_summary(&store, &governor, &summaries, started).await?;
    Ok(())
}

async fn print_summary(
    store: &Store,
    governor: &BudgetGovernor,
    summaries: &[ScanSummary],
    started: Instant,
) -> Result<()> {
    let mut events = 0u64;
    let mut wallets = 0u64;
    let mut skipped = 0u64;

    println!("Scanner results:");
    for summary in summaries {
        events += summary.events_found;
        wallets += summary.wallets_touched;
        skipped += summary.rows_skipped;

        let outcome = match summary.outcome {
            ScanOutcome::UpToDate => "up-to-date",
            ScanOutcome::Completed => "completed",
            ScanOutcome::BudgetStop => "budget stop",
        };
        let cursor = summary
            .cursor
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<24} {:>6} events  {:>4} batches  cursor {:<12} ({outcome})",
            summary.scanner_id, summary.events_found, summary.batches, cursor
        );
    }

    let budget = governor.snapshot();
    let db_size = store.database_size().await?;

    println!(
        "Indexed {events} events ({skipped} rows skipped), {wallets} wallet updates in {:.1}s",
        started.elapsed().as_secs_f64()
    );
    println!(
        "DB size: {} | CU used: {} / {} ({:.2}%)",
        human_bytes(db_size),
        budget.used,
        budget.budget,
        budget.utilization() * 100.0
    );
    for (method, usage) in &budget.methods {
        println!("  {:<28} {:>7} calls  {:>10} CU", method, usage.calls, usage.compute_units);
    }
    if budget.stopped {
        println!("Budget stop engaged: scanning halted at 90% of the monthly CU budget.");
    }

    Ok(())
}
