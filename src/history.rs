// src/history.rs

//! History database seam
//!
//! The history database records what the user originally asked for. The
//! core only needs one operation from it: restricting a package set to
//! the user-installed subset. Callers plug in their own backend; tests
//! use the in-memory implementation.

use crate::pool::Id;
use crate::set::PackageSet;

/// What-was-user-installed lookups
pub trait HistoryDb {
    /// Restrict `pset` to the packages the user explicitly requested
    fn filter_userinstalled(&self, pset: &mut PackageSet);
}

/// In-memory history: a plain set of user-installed solvable ids
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    user_installed: PackageSet,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_user_installed(&mut self, id: Id) {
        self.user_installed.set(id);
    }
}

impl HistoryDb for MemoryHistory {
    fn filter_userinstalled(&self, pset: &mut PackageSet) {
        pset.intersect_with(&self.user_installed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_history_filters() {
        let mut history = MemoryHistory::new();
        history.mark_user_installed(2);
        history.mark_user_installed(5);

        let mut pset: PackageSet = [1, 2, 3, 5].into_iter().collect();
        history.filter_userinstalled(&mut pset);
        assert_eq!(pset.iter().collect::<Vec<_>>(), vec![2, 5]);
    }
}
