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

//! Compute-unit budget tracking for the RPC provider.
//!
//! The governor is process-scoped state with a documented lifecycle: zeroed
//! at process start, advanced by the gateway before every network call,
//! observed by every scanner before every batch. The process root owns the
//! single instance and injects it everywhere.
//!
//! Budget exhaustion is not an error. Crossing 90% of the monthly budget
//! sets a one-way terminal flag; scanners poll it and exit cleanly with
//! their cursor preserved.

use parking_lot::RwLock;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};
use tracing::warn;

/// Compute-unit cost of a call for methods without an explicit entry.
pub const DEFAULT_METHOD_COST: u64 = 25;

/// Warn once when usage crosses this fraction of the budget.
const WARN_NUMERATOR: u64 = 8;
/// Set the terminal stop flag when usage crosses this fraction.
const STOP_NUMERATOR: u64 = 9;
const FRACTION_DENOMINATOR: u64 = 10;

/// Cost-per-call table for the provider's metered methods.
fn method_cost(method: &str) -> u64 {
    match method {
        "eth_blockNumber" => 10,
        "eth_getLogs" => 75,
        "eth_getTransactionReceipt" => 15,
        "eth_getTransactionByHash" => 15,
        _ => DEFAULT_METHOD_COST,
    }
}

/// Per-method usage counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MethodUsage {
    /// Number of calls recorded.
    pub calls: u64,
    /// Compute units those calls cost.
    pub compute_units: u64,
}

/// Point-in-time view of the governor, for run summaries.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetSnapshot {
    /// Compute units consumed this run.
    pub used: u64,
    /// Configured monthly budget.
    pub budget: u64,
    /// Whether the terminal stop flag is set.
    pub stopped: bool,
    /// Per-method breakdown, sorted by method name.
    pub methods: BTreeMap<String, MethodUsage>,
}

impl BudgetSnapshot {
    /// Usage as a fraction of the budget.
    pub fn utilization(&self) -> f64 {
        if self.budget == 0 {
            return 1.0;
        }
        self.used as f64 / self.budget as f64
    }
}

/// Process-scoped compute-unit accounting.
#[derive(Debug)]
pub struct BudgetGovernor {
    budget: u64,
    used: AtomicU64,
    warned: AtomicBool,
    stopped: AtomicBool,
    methods: RwLock<BTreeMap<String, MethodUsage>>,
}

impl BudgetGovernor {
    /// Create a governor for the given monthly budget.
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            used: AtomicU64::new(0),
            warned: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            methods: RwLock::new(BTreeMap::new()),
        }
    }

    /// Record `calls` invocations of `method`.
    ///
    /// Crossing 80% of the budget warns exactly once; crossing 90% sets
    /// the terminal flag. The flag is one-way within a run.
    pub fn record(&self, method: &str, calls: u64) {
        let cost = method_cost(method) * calls;
        let before = self.used.fetch_add(cost, Ordering::SeqCst);
        let after = before + cost;

        {
            let mut methods = self.methods.write();
            let entry = methods.entry(method.to_string()).or_default();
            entry.calls += calls;
            entry.compute_units += cost;
        }

        let warn_at = self.budget / FRACTION_DENOMINATOR * WARN_NUMERATOR;
        let stop_at = self.budget / FRACTION_DENOMINATOR * STOP_NUMERATOR;

        if after >= warn_at && !self.warned.swap(true, Ordering::SeqCst) {
            warn!(
                used = after,
                budget = self.budget,
                "RPC compute-unit usage crossed 80% of the monthly budget"
            );
        }

        if after >= stop_at && !self.stopped.swap(true, Ordering::SeqCst) {
            warn!(
                used = after,
                budget = self.budget,
                "RPC compute-unit usage crossed 90% of the monthly budget, stopping scanners"
            );
        }
    }

    /// Whether scanners must stop. Once true, stays true for the run.
    pub fn should_stop(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Totals and per-method breakdown.
    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            used: self.used.load(Ordering::SeqCst),
            budget: self.budget,
            stopped: self.should_stop(),
            methods: self.methods.read().clone(),
        }
    }

    /// Zero every counter and flag. Test support only.
    pub fn reset(&self) {
        self.used.store(0, Ordering::SeqCst);
        self.warned.store(false, Ordering::SeqCst);
        self.stopped.store(false, Ordering::SeqCst);
        self.methods.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_known_and_unknown_method_costs() {
        let governor = BudgetGovernor::new(1_000_000);
        governor.record("eth_getLogs", 2);
        governor.record("eth_blockNumber", 1);
        governor.record("eth_someFutureMethod", 1);

        let snapshot = governor.snapshot();
        assert_eq!(snapshot.used, 2 * 75 + 10 + DEFAULT_METHOD_COST);
        assert_eq!(snapshot.methods["eth_getLogs"].calls, 2);
        assert_eq!(snapshot.methods["eth_getLogs"].compute_units, 150);
        assert_eq!(snapshot.methods["eth_someFutureMethod"].compute_units, DEFAULT_METHOD_COST);
    }

    #[test]
    fn stop_flag_sets_at_ninety_percent_and_stays() {
        let governor = BudgetGovernor::new(1_000);

        // 35 getLogs calls = 2625 CU on a 1000 CU budget in one record.
        governor.record("eth_getLogs", 35);
        assert!(governor.should_stop());

        // One-way within the run.
        governor.record("eth_blockNumber", 1);
        assert!(governor.should_stop());
    }

    #[test]
    fn below_warning_threshold_does_not_stop() {
        let governor = BudgetGovernor::new(1_000);
        governor.record("eth_getLogs", 10); // 750 CU: short of both thresholds
        assert!(!governor.should_stop());
    }

    #[test]
    fn reset_clears_everything() {
        let governor = BudgetGovernor::new(100);
        governor.record("eth_getLogs", 10);
        assert!(governor.should_stop());

        governor.reset();
        assert!(!governor.should_stop());
        assert_eq!(governor.snapshot().used, 0);
        assert!(governor.snapshot().methods.is_empty());
    }

    #[test]
    fn utilization_is_bounded() {
        let governor = BudgetGovernor::new(0);
        assert!(governor.snapshot().utilization() >= 1.0);

        let governor = BudgetGovernor::new(100);
        governor.record("eth_blockNumber", 1);
        assert!((governor.snapshot().utilization() - 0.1).abs() < 1e-9);
    }
}
