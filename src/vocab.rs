//! Vocabulary: stable integer IDs for entity and relation labels.
//!
//! IDs are dense (`[0, count)`, no gaps) and assigned in first-seen order
//! while scanning the training triples. The vocabulary is built exactly once
//! per preprocessing run and is immutable afterwards; every later component
//! (indexer, model, evaluator) receives it by reference. There is no global
//! registry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::PrepError;
use crate::triples::RawTriple;

/// Result type for preprocessing operations.
pub type PrepResult<T> = std::result::Result<T, PrepError>;

/// A bidirectional label ↔ dense ID mapping.
///
/// The forward map assigns IDs; the reverse side is the insertion-ordered
/// label list, so `labels[id]` inverts `id_of(label)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdMap {
    ids: HashMap<String, u32>,
    labels: Vec<String>,
}

impl IdMap {
    /// Look up the ID assigned to a label.
    pub fn id_of(&self, label: &str) -> Option<u32> {
        self.ids.get(label).copied()
    }

    /// Look up the label a given ID was assigned to.
    pub fn label_of(&self, id: u32) -> Option<&str> {
        self.labels.get(id as usize).map(String::as_str)
    }

    /// Number of assigned IDs. IDs are exactly `0..len()`.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Return the ID for a label, assigning the next unused integer on
    /// first sight. Same label ⇒ same ID.
    fn intern(&mut self, label: &str) -> u32 {
        if let Some(id) = self.ids.get(label) {
            return *id;
        }
        let id = self.labels.len() as u32;
        self.ids.insert(label.to_string(), id);
        self.labels.push(label.to_string());
        id
    }
}

/// The vocabulary of a preprocessing run: one ID space for entities
/// (subjects and objects), one for relations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub entities: IdMap,
    pub relations: IdMap,
}

impl Vocabulary {
    /// Build a vocabulary from raw training triples.
    ///
    /// Subjects and objects feed the entity map in encounter order (subject
    /// before object within a triple), relations the relation map.
    pub fn build(triples: &[RawTriple]) -> Self {
        let mut vocab = Vocabulary::default();
        for t in triples {
            vocab.entities.intern(&t.subject);
            vocab.relations.intern(&t.relation);
            vocab.entities.intern(&t.object);
        }
        vocab
    }

    /// Number of distinct entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of distinct relations.
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }
}
