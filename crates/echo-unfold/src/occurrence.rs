// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Arena-backed occurrence net: the bipartite causal structure of events and
//! conditions grown by an unfolding driver.
use crate::ident::{LabelId, NodeId};

/// The two node variants of an occurrence net.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    /// An occurrence of a transition.
    Event,
    /// An occurrence of a place holding a token.
    Condition,
}

/// Materialised record for a single event or condition.
///
/// Invariants
/// - `pre` and `post` alternate strictly between the two variants: an event's
///   neighbours are conditions and vice versa.
/// - A condition has at most one generating event; initial conditions have none.
/// - Every id in `pre` is smaller than the node's own id.
#[derive(Clone, Debug)]
pub struct Node {
    /// Event or condition.
    pub kind: NodeKind,
    /// Place or transition of the source net this node is an occurrence of.
    pub label: LabelId,
    /// Immediate causal predecessors, in insertion order.
    pub pre: Vec<NodeId>,
    /// Immediate causal successors, in insertion order.
    pub post: Vec<NodeId>,
}

impl Node {
    /// Returns `true` when this node is an event.
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.kind == NodeKind::Event
    }
}

/// Occurrence net over an arena of [`Node`]s addressed by [`NodeId`].
///
/// The net only grows. Nodes are never mutated after insertion except for the
/// `post` lists of their predecessors, which gain the new node. Status flags
/// (cut-off and friends) are kept outside the net in a
/// [`StatusMap`](crate::StatusMap).
#[derive(Clone, Debug, Default)]
pub struct OccurrenceNet {
    nodes: Vec<Node>,
    /// Human-readable names indexed by [`LabelId`].
    names: Vec<String>,
    initial: Vec<NodeId>,
    event_count: usize,
}

impl OccurrenceNet {
    /// Creates an empty net whose labels resolve through `names`.
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self {
            nodes: Vec::new(),
            names,
            initial: Vec::new(),
            event_count: 0,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn next_id(&self) -> NodeId {
        debug_assert!(u32::try_from(self.nodes.len()).is_ok(), "node arena overflow");
        NodeId(self.nodes.len() as u32)
    }

    /// Adds a condition labelled `label`, generated by `producer` (or an
    /// initial condition when `producer` is `None`).
    pub fn add_condition(&mut self, label: LabelId, producer: Option<NodeId>) -> NodeId {
        let id = self.next_id();
        debug_assert!(label.index() < self.names.len(), "label outside name table");
        let pre = match producer {
            Some(event) => {
                debug_assert!(event < id, "producer must already exist");
                debug_assert!(self.nodes[event.index()].is_event(), "condition after condition");
                self.nodes[event.index()].post.push(id);
                vec![event]
            }
            None => {
                self.initial.push(id);
                Vec::new()
            }
        };
        self.nodes.push(Node {
            kind: NodeKind::Condition,
            label,
            pre,
            post: Vec::new(),
        });
        id
    }

    /// Adds an event labelled `label` consuming the conditions in `preset`.
    pub fn add_event(&mut self, label: LabelId, preset: &[NodeId]) -> NodeId {
        let id = self.next_id();
        debug_assert!(label.index() < self.names.len(), "label outside name table");
        for condition in preset {
            debug_assert!(*condition < id, "preset condition must already exist");
            debug_assert!(
                !self.nodes[condition.index()].is_event(),
                "event after event"
            );
            self.nodes[condition.index()].post.push(id);
        }
        self.nodes.push(Node {
            kind: NodeKind::Event,
            label,
            pre: preset.to_vec(),
            post: Vec::new(),
        });
        self.event_count += 1;
        id
    }

    /// Returns the node record for `id`.
    ///
    /// # Panics
    /// Panics if `id` was not issued by this net.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Immediate predecessors of `id`.
    #[must_use]
    pub fn pre(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].pre
    }

    /// Immediate successors of `id`.
    #[must_use]
    pub fn post(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].post
    }

    /// Returns `true` when `id` is an event.
    #[must_use]
    pub fn is_event(&self, id: NodeId) -> bool {
        self.nodes[id.index()].is_event()
    }

    /// Label of `id`.
    #[must_use]
    pub fn label(&self, id: NodeId) -> LabelId {
        self.nodes[id.index()].label
    }

    /// Name of the transition or place `id` is an occurrence of.
    #[must_use]
    pub fn proper_name(&self, id: NodeId) -> &str {
        self.label_name(self.label(id))
    }

    /// Name behind `label` (empty when the label is unknown).
    #[must_use]
    pub fn label_name(&self, label: LabelId) -> &str {
        self.names.get(label.index()).map_or("", String::as_str)
    }

    /// The generating event of a condition (`None` for initial conditions and
    /// for events).
    #[must_use]
    pub fn producer(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id);
        if node.is_event() {
            None
        } else {
            node.pre.first().copied()
        }
    }

    /// Initial conditions in insertion order.
    #[must_use]
    pub fn initial_conditions(&self) -> &[NodeId] {
        &self.initial
    }

    /// Total number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when the net has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of events.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.event_count
    }

    /// Iterates all node ids in ascending order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| NodeId(i as u32))
    }

    /// Iterates all events in ascending id order.
    pub fn events(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids().filter(|id| self.is_event(*id))
    }

    /// Iterates all conditions in ascending id order.
    pub fn conditions(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids().filter(|id| !self.is_event(*id))
    }
}
