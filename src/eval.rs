//! Filtered ranking evaluation: MRR and Hits@{1,3,10}.
//!
//! For each evaluation triple `(s, r, o)` every entity is scored as a
//! candidate object, the scores of all *other* known-true completions of
//! `(s, r)` are masked out, and the rank of `o` among the remaining
//! candidates is recorded. This is the "filtered" protocol standard in the
//! link-prediction literature: a legitimate alternative answer must not be
//! counted as a false negative that worsens the rank of `o`.
//!
//! Ties break deterministically by ascending entity ID, so repeated
//! evaluations of the same model state produce identical metrics. Only the
//! forward `(s, r, ?)` direction is evaluated; the model defines no inverse
//! relations.

use rayon::prelude::*;

use crate::dataset::KnownObjects;
use crate::error::TrainError;
use crate::model::Scorer;
use crate::triples::Triple;

/// Aggregate ranking metrics over one evaluation split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingReport {
    /// Mean reciprocal rank, in `(0, 1]` for a non-empty split.
    pub mrr: f64,
    /// Fraction of triples ranked first.
    pub hits_at_1: f64,
    /// Fraction of triples ranked in the top 3.
    pub hits_at_3: f64,
    /// Fraction of triples ranked in the top 10.
    pub hits_at_10: f64,
    /// Number of triples evaluated.
    pub evaluated: usize,
}

impl std::fmt::Display for RankingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MRR {:.4} | Hits@1 {:.4} | Hits@3 {:.4} | Hits@10 {:.4} ({} triples, forward direction only)",
            self.mrr, self.hits_at_1, self.hits_at_3, self.hits_at_10, self.evaluated
        )
    }
}

/// Filtered rank of the target object within one score row.
///
/// Entities listed in `known` (other than the target itself) are excluded
/// from the competition. Equal scores rank by ascending entity ID.
fn filtered_rank(row: &[f32], target: u32, known: Option<&std::collections::BTreeSet<u32>>) -> usize {
    let target_idx = target as usize;
    let target_score = row[target_idx];
    let mut rank = 1usize;
    for (e, &score) in row.iter().enumerate() {
        if e == target_idx {
            continue;
        }
        if known.is_some_and(|set| set.contains(&(e as u32))) {
            continue;
        }
        if score > target_score || (score == target_score && e < target_idx) {
            rank += 1;
        }
    }
    rank
}

/// Evaluate a scorer over a split of ID triples.
///
/// `known` must be built over every split the run has seen (train ∪ valid ∪
/// test); it is used only for masking, never for training. Scoring happens
/// in batches of `batch_size` queries; rank extraction over the scored rows
/// is data-parallel.
pub fn evaluate(
    scorer: &dyn Scorer,
    known: &KnownObjects,
    triples: &[Triple],
    batch_size: usize,
) -> Result<RankingReport, TrainError> {
    let num_entities = scorer.num_entities();
    let mut sum_rr = 0.0f64;
    let mut hits = [0usize; 3]; // @1, @3, @10

    for chunk in triples.chunks(batch_size.max(1)) {
        let pairs: Vec<(u32, u32)> = chunk.iter().map(|t| (t.subject, t.relation)).collect();
        let rows = scorer.score_candidates(&pairs).map_err(TrainError::Model)?;

        for row in &rows {
            if row.len() != num_entities {
                return Err(TrainError::ShapeMismatch {
                    expected: num_entities,
                    actual: row.len(),
                });
            }
        }
        // A target beyond the scorer's entity count means the split was
        // indexed against a different vocabulary.
        for t in chunk {
            if t.object as usize >= num_entities {
                return Err(TrainError::ShapeMismatch {
                    expected: num_entities,
                    actual: t.object as usize + 1,
                });
            }
        }

        let ranks: Vec<usize> = chunk
            .par_iter()
            .zip(rows.par_iter())
            .map(|(t, row)| filtered_rank(row, t.object, known.objects_for((t.subject, t.relation))))
            .collect();

        for rank in ranks {
            sum_rr += 1.0 / rank as f64;
            if rank <= 1 {
                hits[0] += 1;
            }
            if rank <= 3 {
                hits[1] += 1;
            }
            if rank <= 10 {
                hits[2] += 1;
            }
        }
    }

    let n = triples.len().max(1) as f64;
    Ok(RankingReport {
        mrr: sum_rr / n,
        hits_at_1: hits[0] as f64 / n,
        hits_at_3: hits[1] as f64 / n,
        hits_at_10: hits[2] as f64 / n,
        evaluated: triples.len(),
    })
}
