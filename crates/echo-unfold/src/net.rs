// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Place/transition nets: the input model of the unfolder.
use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::ident::{LabelId, NodeId};
use crate::occurrence::OccurrenceNet;

/// Index of a place within its [`PetriNet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlaceIndex(pub usize);

/// Index of a transition within its [`PetriNet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransitionIndex(pub usize);

/// Error returned while building or validating a [`PetriNet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetError {
    /// Two places share a name; arcs address places by name.
    #[error("duplicate place name: {0}")]
    DuplicatePlace(String),
    /// An arc references a place that does not exist.
    #[error("transition {transition:?} references unknown place {place:?}")]
    UnknownPlace {
        /// Transition owning the arc.
        transition: String,
        /// Place name or index that could not be resolved.
        place: String,
    },
    /// A transition without input places would be enabled forever.
    #[error("transition {0:?} has an empty preset")]
    EmptyPreset(String),
    /// Place names and distinct transition names together exceed the label
    /// space.
    #[error("net has {0} labels; at most 65536 are supported")]
    TooManyLabels(usize),
}

/// A place with its initial token count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Place {
    /// Unique place name.
    pub name: String,
    /// Tokens in the initial marking.
    pub tokens: u32,
}

/// A transition with its input and output places.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Transition name; several transitions may share one.
    pub name: String,
    /// Input places (deduplicated, ascending).
    pub preset: Vec<PlaceIndex>,
    /// Output places (deduplicated, ascending).
    pub postset: Vec<PlaceIndex>,
}

/// Ordinary place/transition net with an initial marking.
///
/// Labels are places first, then one label per distinct transition name:
/// transitions sharing a name are occurrences of the same action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PetriNet {
    places: Vec<Place>,
    transitions: Vec<Transition>,
    /// Distinct transition names in first-seen order.
    actions: Vec<String>,
    /// Index into `actions` for every transition.
    action_of: Vec<usize>,
}

impl PetriNet {
    /// Creates an empty net.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a place holding `tokens` initially.
    pub fn add_place(&mut self, name: &str, tokens: u32) -> Result<PlaceIndex, NetError> {
        if self.places.iter().any(|p| p.name == name) {
            return Err(NetError::DuplicatePlace(name.to_owned()));
        }
        self.check_label_space(1)?;
        self.places.push(Place {
            name: name.to_owned(),
            tokens,
        });
        Ok(PlaceIndex(self.places.len() - 1))
    }

    /// Adds a transition consuming from `preset` and producing into `postset`.
    ///
    /// Arc multiplicities are not modelled; repeated places collapse.
    pub fn add_transition(
        &mut self,
        name: &str,
        preset: &[PlaceIndex],
        postset: &[PlaceIndex],
    ) -> Result<TransitionIndex, NetError> {
        if preset.is_empty() {
            return Err(NetError::EmptyPreset(name.to_owned()));
        }
        for place in preset.iter().chain(postset) {
            if place.0 >= self.places.len() {
                return Err(NetError::UnknownPlace {
                    transition: name.to_owned(),
                    place: format!("#{}", place.0),
                });
            }
        }
        let action = match self.actions.iter().position(|a| a == name) {
            Some(action) => action,
            None => {
                self.check_label_space(1)?;
                self.actions.push(name.to_owned());
                self.actions.len() - 1
            }
        };
        self.action_of.push(action);
        let dedup = |arcs: &[PlaceIndex]| -> Vec<PlaceIndex> {
            arcs.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
        };
        self.transitions.push(Transition {
            name: name.to_owned(),
            preset: dedup(preset),
            postset: dedup(postset),
        });
        Ok(TransitionIndex(self.transitions.len() - 1))
    }

    fn check_label_space(&self, extra: usize) -> Result<(), NetError> {
        let total = self.places.len() + self.actions.len() + extra;
        if total > usize::from(u16::MAX) + 1 {
            return Err(NetError::TooManyLabels(total));
        }
        Ok(())
    }

    /// All places in index order.
    #[must_use]
    pub fn places(&self) -> &[Place] {
        &self.places
    }

    /// All transitions in index order.
    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Looks up a place by name.
    #[must_use]
    pub fn place_by_name(&self, name: &str) -> Option<PlaceIndex> {
        self.places.iter().position(|p| p.name == name).map(PlaceIndex)
    }

    /// Label of `place` in the occurrence-net name table.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn place_label(&self, place: PlaceIndex) -> LabelId {
        LabelId(place.0 as u16)
    }

    /// Label of `transition` in the occurrence-net name table (places first,
    /// transition names after). Equally named transitions share a label.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn transition_label(&self, transition: TransitionIndex) -> LabelId {
        LabelId((self.places.len() + self.action_of[transition.0]) as u16)
    }

    /// Name table shared by every occurrence net unfolded from this net.
    #[must_use]
    pub fn label_names(&self) -> Vec<String> {
        self.places
            .iter()
            .map(|p| p.name.clone())
            .chain(self.actions.iter().cloned())
            .collect()
    }

    /// Resolves a name-based description into a net.
    pub fn from_description(description: &NetDescription) -> Result<Self, NetError> {
        let mut net = Self::new();
        for place in &description.places {
            net.add_place(&place.name, place.tokens)?;
        }
        for transition in &description.transitions {
            let resolve = |names: &[String]| -> Result<Vec<PlaceIndex>, NetError> {
                names
                    .iter()
                    .map(|name| {
                        net.place_by_name(name).ok_or_else(|| NetError::UnknownPlace {
                            transition: transition.name.clone(),
                            place: name.clone(),
                        })
                    })
                    .collect()
            };
            let preset = resolve(&transition.inputs)?;
            let postset = resolve(&transition.outputs)?;
            net.add_transition(&transition.name, &preset, &postset)?;
        }
        Ok(net)
    }

    /// Name-based description of this net.
    #[must_use]
    pub fn to_description(&self) -> NetDescription {
        let names = |arcs: &[PlaceIndex]| -> Vec<String> {
            arcs.iter().map(|p| self.places[p.0].name.clone()).collect()
        };
        NetDescription {
            places: self
                .places
                .iter()
                .map(|p| PlaceSpec {
                    name: p.name.clone(),
                    tokens: p.tokens,
                })
                .collect(),
            transitions: self
                .transitions
                .iter()
                .map(|t| TransitionSpec {
                    name: t.name.clone(),
                    inputs: names(&t.preset),
                    outputs: names(&t.postset),
                })
                .collect(),
        }
    }
}

/// Place entry of a [`NetDescription`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlaceSpec {
    /// Unique place name.
    pub name: String,
    /// Initial tokens.
    #[cfg_attr(feature = "serde", serde(default))]
    pub tokens: u32,
}

/// Transition entry of a [`NetDescription`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransitionSpec {
    /// Transition name.
    pub name: String,
    /// Names of input places.
    pub inputs: Vec<String>,
    /// Names of output places.
    #[cfg_attr(feature = "serde", serde(default))]
    pub outputs: Vec<String>,
}

/// Name-based, serializable form of a [`PetriNet`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetDescription {
    /// Places with initial tokens.
    pub places: Vec<PlaceSpec>,
    /// Transitions with their arcs.
    pub transitions: Vec<TransitionSpec>,
}

/// Read-only set of transition names treated as silent.
///
/// Silent transitions do not count as behaviour: they are ignored by every
/// label-set comparison of the cut-off engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SilentTransitions {
    names: BTreeSet<String>,
}

impl SilentTransitions {
    /// No silent transitions.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Transitions whose name is empty or starts with `"tau "`.
    #[must_use]
    pub fn detect(net: &PetriNet) -> Self {
        net.transitions
            .iter()
            .filter(|t| t.name.is_empty() || t.name.starts_with("tau "))
            .map(|t| t.name.clone())
            .collect()
    }

    /// Adds `name` to the set.
    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// Returns `true` when transitions named `name` are silent.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns `true` when the node `id` of `net` is an occurrence of a
    /// silent transition.
    #[must_use]
    pub fn is_silent(&self, net: &OccurrenceNet, id: NodeId) -> bool {
        self.contains(net.proper_name(id))
    }

    /// Silent names in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of silent names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` when no transition is silent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for SilentTransitions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl Extend<String> for SilentTransitions {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.names.extend(iter);
    }
}

/// Consumers of each place: transitions whose preset contains it.
pub(crate) fn consumers(net: &PetriNet) -> BTreeMap<PlaceIndex, Vec<TransitionIndex>> {
    let mut map: BTreeMap<PlaceIndex, Vec<TransitionIndex>> = BTreeMap::new();
    for (t, transition) in net.transitions.iter().enumerate() {
        for place in &transition.preset {
            map.entry(*place).or_default().push(TransitionIndex(t));
        }
    }
    map
}
