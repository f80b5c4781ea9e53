//! Serialized preprocessing artifacts.
//!
//! Preprocessing is a one-shot transformation; its outputs are read-only
//! inputs to every later training run. Two artifact kinds exist:
//!
//! - [`TrainArtifact`] — the vocabulary plus the multi-label dataset.
//! - [`EvalArtifact`] — the ID triples of a validation/test split plus the
//!   vocabulary they were indexed against.
//!
//! Both are bincode-encoded. Files are written only after the full structure
//! has been built in memory, so a preprocessing failure never leaves a
//! partial artifact behind. Pairing a training artifact with an evaluation
//! artifact from a different vocabulary is detected at load time
//! ([`TrainError::ShapeMismatch`]), not trusted implicitly.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::MultiLabelDataset;
use crate::error::{PrepError, TrainError};
use crate::triples::{index_triples, parse_triples, Triple};
use crate::vocab::{PrepResult, Vocabulary};

/// Training artifact: vocabulary + multi-label dataset, plus the raw ID
/// triples (the evaluator needs them for the filter index).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainArtifact {
    pub vocab: Vocabulary,
    pub dataset: MultiLabelDataset,
    pub triples: Vec<Triple>,
}

/// Validation/test artifact: ID triples indexed against a training
/// vocabulary, carried along for provenance and pairing checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalArtifact {
    pub vocab: Vocabulary,
    pub triples: Vec<Triple>,
}

/// Build a training artifact from a raw triple file.
pub fn preprocess_train(path: &Path) -> PrepResult<TrainArtifact> {
    let content = read_file(path)?;
    let raw = parse_triples(&content)?;
    let vocab = Vocabulary::build(&raw);
    let triples = index_triples(&vocab, &raw)?;
    let dataset = MultiLabelDataset::build(&triples);
    info!(
        entities = vocab.entity_count(),
        relations = vocab.relation_count(),
        triples = triples.len(),
        keys = dataset.len(),
        "built training artifact"
    );
    Ok(TrainArtifact {
        vocab,
        dataset,
        triples,
    })
}

/// Build an evaluation artifact by indexing a raw triple file against an
/// existing training vocabulary. Fails on the first unknown label.
pub fn preprocess_eval(vocab: &Vocabulary, path: &Path) -> PrepResult<EvalArtifact> {
    let content = read_file(path)?;
    let raw = parse_triples(&content)?;
    let triples = index_triples(vocab, &raw)?;
    info!(triples = triples.len(), "built evaluation artifact");
    Ok(EvalArtifact {
        vocab: vocab.clone(),
        triples,
    })
}

/// Verify that an evaluation artifact was indexed against the same
/// vocabulary as a training artifact.
pub fn check_paired(train: &TrainArtifact, eval: &EvalArtifact) -> Result<(), TrainError> {
    if train.vocab.entity_count() != eval.vocab.entity_count()
        || train.vocab.relation_count() != eval.vocab.relation_count()
    {
        return Err(TrainError::ShapeMismatch {
            expected: train.vocab.entity_count(),
            actual: eval.vocab.entity_count(),
        });
    }
    Ok(())
}

/// Write any serializable artifact to disk with bincode.
pub fn save<T: Serialize>(artifact: &T, path: &Path) -> PrepResult<()> {
    let bytes = bincode::serialize(artifact).map_err(|e| PrepError::Encode {
        message: e.to_string(),
    })?;
    fs::write(path, bytes).map_err(|e| PrepError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Read a bincode artifact from disk.
pub fn load<T: for<'de> Deserialize<'de>>(path: &Path) -> PrepResult<T> {
    let bytes = fs::read(path).map_err(|e| PrepError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    bincode::deserialize(&bytes).map_err(|e| PrepError::Decode {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn read_file(path: &Path) -> PrepResult<String> {
    fs::read_to_string(path).map_err(|e| PrepError::Io {
        path: path.display().to_string(),
        source: e,
    })
}
