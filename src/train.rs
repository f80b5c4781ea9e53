//! Training loop: label-smoothed 1-N binary cross-entropy over the
//! multi-label dataset.
//!
//! Each epoch shuffles the `(subject, relation)` keys (seedable for
//! reproducibility), partitions them into fixed-size batches, and runs
//! forward → loss → backward → AdamW step per batch. The loss is binary
//! cross-entropy computed from logits against the label-smoothed multi-hot
//! target.
//!
//! A non-finite loss is a warning, not an abort: the offending batch's step
//! is skipped and training continues. A target/vocabulary disagreement is a
//! fatal [`TrainError::ShapeMismatch`], because it means the artifacts being
//! trained against were built from different vocabularies.

use std::collections::BTreeSet;
use std::path::PathBuf;

use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::artifact::{check_paired, EvalArtifact, TrainArtifact};
use crate::dataset::{KnownObjects, PairKey};
use crate::error::TrainError;
use crate::eval::{evaluate, RankingReport};
use crate::model::{DsConvE, ModelConfig, Scorer};

/// Result type for training operations.
pub type TrainResult<T> = std::result::Result<T, TrainError>;

/// Trainer hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Keys per mini-batch.
    pub batch_size: usize,
    /// Number of passes over the dataset.
    pub epochs: usize,
    /// Label smoothing factor ε; 0 recovers the raw multi-hot target.
    pub label_smooth: f32,
    /// AdamW learning rate.
    pub lr: f64,
    /// Shuffle seed. `None` draws a fresh seed per run.
    pub seed: Option<u64>,
    /// Evaluate (and checkpoint) every N epochs.
    pub eval_every: usize,
    /// Where to write safetensors checkpoints; `None` disables them.
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            epochs: 90,
            label_smooth: 0.1,
            lr: 3e-3,
            seed: None,
            eval_every: 1,
            checkpoint_dir: None,
        }
    }
}

/// Apply label smoothing to a multi-hot target value.
///
/// `target * (1 - ε) + ε / |E|`; with ε = 0 the target is unchanged.
pub fn smooth(target: f32, epsilon: f32, num_entities: usize) -> f32 {
    target * (1.0 - epsilon) + epsilon / num_entities as f32
}

/// Build the flat row-major smoothed target matrix for a batch of dataset
/// entries (`(s, r)` key plus its label set).
///
/// Every row has length `num_entities`; an object ID at or beyond
/// `num_entities` means the dataset and the model vocabulary disagree.
pub fn smoothed_targets(
    batch: &[(PairKey, &BTreeSet<u32>)],
    num_entities: usize,
    epsilon: f32,
) -> TrainResult<Vec<f32>> {
    let cold = smooth(0.0, epsilon, num_entities);
    let hot = smooth(1.0, epsilon, num_entities);
    let mut rows = vec![cold; batch.len() * num_entities];
    for (i, (_, objects)) in batch.iter().enumerate() {
        for &o in *objects {
            if o as usize >= num_entities {
                return Err(TrainError::ShapeMismatch {
                    expected: num_entities,
                    actual: o as usize + 1,
                });
            }
            rows[i * num_entities + o as usize] = hot;
        }
    }
    Ok(rows)
}

/// Checkpoint directory for a run name: `checkpoint-<name>` (an empty name
/// yields `checkpoint-`, matching the artifact layout of earlier runs).
pub fn checkpoint_dir_for(name: &str) -> PathBuf {
    PathBuf::from(format!("checkpoint-{name}"))
}

/// Drives mini-batch gradient descent of a [`DsConvE`] model over a
/// multi-label training artifact. The trainer is the sole owner and mutator
/// of the model parameters; steps never overlap.
pub struct Trainer {
    cfg: TrainConfig,
    model: DsConvE,
    varmap: VarMap,
    opt: AdamW,
    device: Device,
}

impl Trainer {
    /// Initialize fresh model parameters sized by the artifact's vocabulary.
    pub fn new(
        train: &TrainArtifact,
        model_cfg: ModelConfig,
        cfg: TrainConfig,
        device: &Device,
    ) -> TrainResult<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let model = DsConvE::new(
            train.vocab.entity_count(),
            train.vocab.relation_count(),
            model_cfg,
            vb,
        )?;
        let opt = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: cfg.lr,
                ..Default::default()
            },
        )
        .map_err(crate::error::ModelError::from)?;
        Ok(Self {
            cfg,
            model,
            varmap,
            opt,
            device: device.clone(),
        })
    }

    /// The trained model.
    pub fn model(&self) -> &DsConvE {
        &self.model
    }

    /// Run the full training loop, evaluating on the validation artifact
    /// every `eval_every` epochs. Returns the last evaluation report.
    pub fn run(
        &mut self,
        train: &TrainArtifact,
        valid: &EvalArtifact,
    ) -> TrainResult<RankingReport> {
        check_paired(train, valid)?;

        // Filter index over everything this run knows to be true; used only
        // to mask alternatives during ranking.
        let known = KnownObjects::build([train.triples.as_slice(), valid.triples.as_slice()]);

        let mut rng = match self.cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut entries: Vec<(PairKey, &BTreeSet<u32>)> = train.dataset.iter().collect();
        let mut last_report = None;

        for epoch in 0..self.cfg.epochs {
            entries.shuffle(&mut rng);
            let avg = self.train_epoch(epoch, &entries)?;
            info!(epoch = epoch + 1, avg_loss = avg, "epoch complete");

            if (epoch + 1) % self.cfg.eval_every.max(1) == 0 {
                let report = evaluate(&self.model, &known, &valid.triples, self.cfg.batch_size)?;
                info!(epoch = epoch + 1, %report, "validation");
                self.checkpoint(epoch + 1)?;
                last_report = Some(report);
            }
        }

        match last_report {
            Some(report) => Ok(report),
            None => {
                let report = evaluate(&self.model, &known, &valid.triples, self.cfg.batch_size)?;
                info!(%report, "final validation");
                Ok(report)
            }
        }
    }

    /// One pass over the shuffled dataset entries. Returns the
    /// moving-average loss.
    fn train_epoch(
        &mut self,
        epoch: usize,
        entries: &[(PairKey, &BTreeSet<u32>)],
    ) -> TrainResult<f32> {
        let num_entities = self.model.num_entities();
        let mut moving_loss = 0.0f32;

        for batch in entries.chunks(self.cfg.batch_size.max(1)) {
            let targets = smoothed_targets(batch, num_entities, self.cfg.label_smooth)?;
            let targets = Tensor::from_vec(targets, (batch.len(), num_entities), &self.device)
                .map_err(crate::error::ModelError::from)?;

            let keys: Vec<PairKey> = batch.iter().map(|(k, _)| *k).collect();
            let logits = self.model.forward_ids(&keys, true)?;
            let loss = candle_nn::loss::binary_cross_entropy_with_logit(&logits, &targets)
                .map_err(crate::error::ModelError::from)?;
            let loss_val = loss
                .to_scalar::<f32>()
                .map_err(crate::error::ModelError::from)?;

            if !loss_val.is_finite() {
                warn!(
                    epoch = epoch + 1,
                    loss = loss_val,
                    "non-finite loss; skipping optimizer step for this batch"
                );
                continue;
            }

            self.opt
                .backward_step(&loss)
                .map_err(crate::error::ModelError::from)?;

            moving_loss = if moving_loss == 0.0 {
                loss_val
            } else {
                moving_loss * 0.9 + loss_val * 0.1
            };
        }

        Ok(moving_loss)
    }

    /// Write a safetensors checkpoint for the given 1-based epoch.
    fn checkpoint(&self, epoch: usize) -> TrainResult<()> {
        let Some(dir) = &self.cfg.checkpoint_dir else {
            return Ok(());
        };
        std::fs::create_dir_all(dir).map_err(|e| TrainError::Checkpoint {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
        let path = dir.join(format!("epoch_{epoch:03}.safetensors"));
        self.varmap.save(&path).map_err(|e| TrainError::Checkpoint {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        info!(path = %path.display(), "wrote checkpoint");
        Ok(())
    }
}
