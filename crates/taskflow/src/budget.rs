use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use forge_common::ForgeError;

/// A single atomically-decremented token pool, the same CAS-loop shape the
/// teacher uses for its concurrent-agent admission count.
struct Pool {
    remaining: AtomicU64,
}

impl Pool {
    fn new(capacity: u64) -> Self {
        Pool { remaining: AtomicU64::new(capacity) }
    }

    fn try_spend(&self, amount: u64) -> bool {
        let mut current = self.remaining.load(Ordering::Acquire);
        loop {
            if amount > current {
                return false;
            }
            match self.remaining.compare_exchange_weak(current, current - amount, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return true,
                Err(updated) => current = updated,
            }
        }
    }

    fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }
}

/// Per-node and global token budgets, both decremented before a call is let
/// through. Each node's allotment is capped at the same global ceiling
/// (there's no separate per-node quota in `SLAPolicy`), so this enforces
/// that no single node monopolizes the whole run's budget across retries.
pub struct TaskBudgets {
    global: Pool,
    per_node_cap: u64,
    spent_by_node: Mutex<HashMap<String, u64>>,
}

impl TaskBudgets {
    pub fn new(max_tokens: u64) -> Self {
        TaskBudgets { global: Pool::new(max_tokens), per_node_cap: max_tokens, spent_by_node: Mutex::new(HashMap::new()) }
    }

    /// Denies without touching either pool when `amount` would exceed the
    /// node's cap or the global remainder.
    pub fn try_spend(&self, node_id: &str, amount: u64) -> Result<(), ForgeError> {
        let node_spent = {
            let spent = self.spent_by_node.lock().expect("budget lock poisoned");
            spent.get(node_id).copied().unwrap_or(0)
        };
        if node_spent.saturating_add(amount) > self.per_node_cap {
            return Err(ForgeError::BudgetExhausted(format!(
                "node '{node_id}' has spent {node_spent} tokens; requesting {amount} more exceeds its cap of {}",
                self.per_node_cap
            )));
        }
        if !self.global.try_spend(amount) {
            return Err(ForgeError::BudgetExhausted(format!("requesting {amount} tokens exceeds the {} remaining globally", self.global.remaining())));
        }
        *self.spent_by_node.lock().expect("budget lock poisoned").entry(node_id.to_string()).or_insert(0) += amount;
        Ok(())
    }

    pub fn global_remaining(&self) -> u64 {
        self.global.remaining()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denies_when_node_cap_exceeded() {
        let budgets = TaskBudgets::new(100);
        assert!(budgets.try_spend("a", 60).is_ok());
        assert!(budgets.try_spend("a", 50).is_err());
    }

    #[test]
    fn denies_when_global_pool_exhausted() {
        let budgets = TaskBudgets::new(100);
        assert!(budgets.try_spend("a", 60).is_ok());
        assert!(budgets.try_spend("b", 60).is_err());
    }

    #[test]
    fn independent_nodes_each_get_the_full_cap() {
        let budgets = TaskBudgets::new(200);
        assert!(budgets.try_spend("a", 100).is_ok());
        assert!(budgets.try_spend("b", 100).is_ok());
    }
}
