// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-node status records owned by the unfolding driver.
use std::collections::BTreeMap;

use crate::ident::NodeId;

/// Status flags of one node.
///
/// Nodes without an entry in the [`StatusMap`] have every flag cleared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeStatus {
    /// The node is a cut-off event or an output condition of one.
    pub cut_off: bool,
    /// The node belongs to a provably infeasible continuation.
    pub anti: bool,
    /// Anti node that is still structurally reachable.
    pub hot: bool,
    /// The node is implied by other nodes of the prefix.
    pub implied: bool,
}

impl NodeStatus {
    /// Short lowercase name of the most significant flag (`"ok"` when none is set).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match (self.anti, self.hot, self.implied, self.cut_off) {
            (true, true, _, _) => "anti",
            (true, false, _, _) => "hidden",
            (false, _, true, _) => "implied",
            (false, _, false, true) => "cut-off",
            _ => "ok",
        }
    }
}

/// Mapping from node identity to its [`NodeStatus`].
///
/// The driver is the only writer. Decision logic reads it and requests status
/// transitions through return values.
#[derive(Clone, Debug, Default)]
pub struct StatusMap {
    entries: BTreeMap<NodeId, NodeStatus>,
}

impl StatusMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of `id` (all flags cleared when never set).
    #[must_use]
    pub fn get(&self, id: NodeId) -> NodeStatus {
        self.entries.get(&id).copied().unwrap_or_default()
    }

    /// Returns `true` when `id` has been marked cut-off.
    #[must_use]
    pub fn is_cut_off(&self, id: NodeId) -> bool {
        self.get(id).cut_off
    }

    /// Marks `id` as cut-off.
    pub fn mark_cut_off(&mut self, id: NodeId) {
        self.entries.entry(id).or_default().cut_off = true;
    }

    /// Marks `id` as anti; `hot` records whether it is still reachable.
    pub fn mark_anti(&mut self, id: NodeId, hot: bool) {
        let status = self.entries.entry(id).or_default();
        status.anti = true;
        status.hot = hot;
    }

    /// Marks `id` as implied.
    pub fn mark_implied(&mut self, id: NodeId) {
        self.entries.entry(id).or_default().implied = true;
    }

    /// Iterates nodes with at least one flag ever set, in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, NodeStatus)> + '_ {
        self.entries.iter().map(|(id, status)| (*id, *status))
    }
}
