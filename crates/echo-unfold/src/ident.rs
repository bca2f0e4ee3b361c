// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier and hashing utilities.
use blake3::Hasher;

/// Canonical 256-bit digest used for reached markings.
pub type Hash = [u8; 32];

/// Arena index of a node (event or condition) in an [`OccurrenceNet`].
///
/// Ids are assigned densely in insertion order and are never reused. Because a
/// node may only reference nodes that already exist, `pre` edges always point
/// to smaller ids; the occurrence net is acyclic by construction.
///
/// [`OccurrenceNet`]: crate::OccurrenceNet
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    /// Returns the arena slot of this node.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Small integer label tying a node back to the place or transition of the
/// source net it is an occurrence of.
///
/// Labels index the name table of the occurrence net. Places occupy the low
/// range and transitions follow, so a label alone tells which element of the
/// source net a node stands for.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabelId(pub u16);

impl LabelId {
    /// Returns the slot of this label in the name table.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Produces the domain-separated digest (prefix `b"marking:"`) of a marking.
///
/// The marking is given as the multiset of place labels of a cut. Labels are
/// sorted before hashing so the digest does not depend on cut order; each
/// label is encoded as 2-byte little-endian after an 8-byte little-endian count.
pub fn marking_digest(places: impl IntoIterator<Item = LabelId>) -> Hash {
    let mut sorted: Vec<LabelId> = places.into_iter().collect();
    sorted.sort_unstable();
    let mut hasher = Hasher::new();
    hasher.update(b"marking:");
    hasher.update(&(sorted.len() as u64).to_le_bytes());
    for label in &sorted {
        hasher.update(&label.0.to_le_bytes());
    }
    hasher.finalize().into()
}
