//! Multi-label training dataset and the known-objects filter index.
//!
//! Training uses the 1-N formulation: one example per distinct
//! `(subject, relation)` key, scored against all entities with a multi-hot
//! target of every object seen with that key. This replaces per-triple
//! negative sampling entirely; reverting to single-positive examples would
//! make reported metrics incomparable with the ConvE literature.
//!
//! The same grouping, built over train ∪ valid ∪ test, doubles as the
//! filter index for evaluation. The two must never be conflated: the filter
//! index is for masking known-true completions during ranking only, never
//! for training targets.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::triples::Triple;

/// A `(subject_id, relation_id)` grouping key.
pub type PairKey = (u32, u32);

/// The multi-label training dataset: each `(s, r)` key maps to the set of
/// all object IDs known to complete it in the training data.
///
/// Backed by ordered collections so iteration order and the serialized form
/// are reproducible across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiLabelDataset {
    groups: BTreeMap<PairKey, BTreeSet<u32>>,
}

impl MultiLabelDataset {
    /// Group ID triples by `(subject, relation)`, merging object sets when
    /// the same key recurs (it will, for one-to-many relations).
    pub fn build(triples: &[Triple]) -> Self {
        let mut groups: BTreeMap<PairKey, BTreeSet<u32>> = BTreeMap::new();
        for t in triples {
            groups
                .entry((t.subject, t.relation))
                .or_default()
                .insert(t.object);
        }
        Self { groups }
    }

    /// Number of distinct `(s, r)` keys.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the dataset holds no keys.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The label set for a key, if the key appears in the training data.
    pub fn objects_for(&self, key: PairKey) -> Option<&BTreeSet<u32>> {
        self.groups.get(&key)
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = PairKey> + '_ {
        self.groups.keys().copied()
    }

    /// Iterate over `(key, label set)` entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (PairKey, &BTreeSet<u32>)> {
        self.groups.iter().map(|(k, v)| (*k, v))
    }
}

/// Index of every known-true completion, used exclusively by the filtered
/// evaluator to mask legitimate alternative answers out of a ranking.
#[derive(Debug, Clone, Default)]
pub struct KnownObjects {
    groups: BTreeMap<PairKey, BTreeSet<u32>>,
}

impl KnownObjects {
    /// Build the filter index from every triple split available
    /// (train ∪ valid ∪ test).
    pub fn build<'a>(splits: impl IntoIterator<Item = &'a [Triple]>) -> Self {
        let mut groups: BTreeMap<PairKey, BTreeSet<u32>> = BTreeMap::new();
        for split in splits {
            for t in split {
                groups
                    .entry((t.subject, t.relation))
                    .or_default()
                    .insert(t.object);
            }
        }
        Self { groups }
    }

    /// Known objects for a key. Empty slice view if the key is unseen.
    pub fn objects_for(&self, key: PairKey) -> Option<&BTreeSet<u32>> {
        self.groups.get(&key)
    }
}
