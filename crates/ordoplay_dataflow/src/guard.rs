// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visited-set scope for recursive graph walks.
//!
//! Every query that may walk a cyclic graph (`is_child_of`, `is_in_loop`,
//! `clear_calculation`, ...) creates one [`RecursionGuard`] at its top-level
//! call and threads it through its recursion. The first node to enter the
//! guard owns the scope; only that node's [`RecursionGuard::end_search`]
//! clears it, so inner frames can close their own search without wiping
//! the visited set of the outer walk.

use crate::node::NodeId;
use std::collections::HashSet;

/// Visited-node scope for one top-level graph query
#[derive(Debug, Default)]
pub struct RecursionGuard {
    owner: Option<NodeId>,
    visited: HashSet<NodeId>,
}

impl RecursionGuard {
    /// Create an empty guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `node`; returns `true` if it was already visited and the walk should stop
    pub fn begin_search(&mut self, node: NodeId) -> bool {
        if self.owner.is_none() {
            self.owner = Some(node);
        }
        !self.visited.insert(node)
    }

    /// Leave `node`; the scope is cleared only when `node` owns it
    pub fn end_search(&mut self, node: NodeId) {
        if self.owner == Some(node) {
            self.abort_search();
        }
    }

    /// Clear the scope regardless of owner
    pub fn abort_search(&mut self) {
        self.owner = None;
        self.visited.clear();
    }

    /// Node that opened the current scope
    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    /// Check whether a search is in progress
    pub fn is_active(&self) -> bool {
        self.owner.is_some()
    }

    /// Check whether `node` was visited in the current scope
    pub fn visited(&self, node: NodeId) -> bool {
        self.visited.contains(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_caller_owns_scope() {
        let mut guard = RecursionGuard::new();
        let a = NodeId(1);
        let b = NodeId(2);

        assert!(!guard.begin_search(a));
        assert!(!guard.begin_search(b));
        assert_eq!(guard.owner(), Some(a));

        // Inner frame closing does not clear the scope
        guard.end_search(b);
        assert!(guard.visited(b));
        assert!(guard.begin_search(b));

        guard.end_search(a);
        assert!(!guard.is_active());
        assert!(!guard.visited(b));
    }

    #[test]
    fn test_abort_clears_immediately() {
        let mut guard = RecursionGuard::new();
        guard.begin_search(NodeId(7));
        guard.begin_search(NodeId(8));
        guard.abort_search();
        assert!(!guard.is_active());
        assert!(!guard.begin_search(NodeId(8)));
        assert_eq!(guard.owner(), Some(NodeId(8)));
    }
}
