//! Raw triple parsing and the vocabulary-backed triple indexer.
//!
//! Raw files are one triple per line, `subject<TAB>relation<TAB>object`.
//! Parsing is strict: any line that does not split into exactly 3 fields is a
//! [`PrepError::MalformedTriple`], and indexing an evaluation triple whose
//! label was never seen during training is a [`PrepError::UnknownLabel`].
//! Both abort the whole preprocessing invocation before anything is written;
//! silently dropping a bad triple would corrupt filtered-evaluation metrics.

use serde::{Deserialize, Serialize};

use crate::error::{LabelRole, PrepError};
use crate::vocab::{PrepResult, Vocabulary};

/// A triple as read from disk: three labels plus the 1-based source line,
/// kept for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTriple {
    pub subject: String,
    pub relation: String,
    pub object: String,
    pub line: usize,
}

/// A vocabulary-indexed triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: u32,
    pub relation: u32,
    pub object: u32,
}

impl Triple {
    /// Create a new ID triple.
    pub fn new(subject: u32, relation: u32, object: u32) -> Self {
        Self {
            subject,
            relation,
            object,
        }
    }
}

/// Parse the contents of a triple file.
///
/// Trailing empty lines are ignored; an empty line in the middle of the file
/// is malformed like any other bad record.
pub fn parse_triples(content: &str) -> PrepResult<Vec<RawTriple>> {
    let mut triples = Vec::new();
    let trimmed = content.trim_end_matches(['\n', '\r']);
    if trimmed.is_empty() {
        return Ok(triples);
    }
    for (idx, line) in trimmed.lines().enumerate() {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 3 {
            return Err(PrepError::MalformedTriple {
                line: idx + 1,
                fields: if line.is_empty() { 0 } else { fields.len() },
            });
        }
        triples.push(RawTriple {
            subject: fields[0].to_string(),
            relation: fields[1].to_string(),
            object: fields[2].to_string(),
            line: idx + 1,
        });
    }
    Ok(triples)
}

/// Map raw triples to ID triples against a fixed vocabulary.
///
/// For the training set this cannot fail (the vocabulary was built from the
/// same triples). For validation/test sets, the first label absent from the
/// vocabulary fails the whole invocation, naming the label, its role, and
/// its source line.
pub fn index_triples(vocab: &Vocabulary, triples: &[RawTriple]) -> PrepResult<Vec<Triple>> {
    triples
        .iter()
        .map(|t| {
            let subject = lookup_entity(vocab, &t.subject, t.line)?;
            let relation =
                vocab
                    .relations
                    .id_of(&t.relation)
                    .ok_or_else(|| PrepError::UnknownLabel {
                        label: t.relation.clone(),
                        role: LabelRole::Relation,
                        line: t.line,
                    })?;
            let object = lookup_entity(vocab, &t.object, t.line)?;
            Ok(Triple::new(subject, relation, object))
        })
        .collect()
}

fn lookup_entity(vocab: &Vocabulary, label: &str, line: usize) -> PrepResult<u32> {
    vocab
        .entities
        .id_of(label)
        .ok_or_else(|| PrepError::UnknownLabel {
            label: label.to_string(),
            role: LabelRole::Entity,
            line,
        })
}
