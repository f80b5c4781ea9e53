//! DSConvE: a ConvE-style scorer with a depthwise-separable convolution.
//!
//! Given a `(subject, relation)` pair the model produces one score per
//! candidate object entity:
//!
//! 1. look up subject and relation embeddings (dimension `emb_w * emb_h`),
//! 2. reshape each to `(emb_w, emb_h)` and stack them into a 2-row-block
//!    single-channel image of shape `(2*emb_w, emb_h)`,
//! 3. depthwise k×k convolution followed by a 1×1 pointwise convolution
//!    (both bias-free), ReLU, batch normalization over the feature map,
//!    flatten,
//! 4. linear projection back to the embedding dimension, ReLU, batch
//!    normalization over the projected features,
//! 5. dot product against every entity embedding row plus a learned
//!    per-entity bias.
//!
//! Step 5 yields logits; the loss is computed from logits directly and the
//! sigmoid is applied only where probabilities are reported. Embedding
//! lookups have no out-of-range fallback — the indexer's fail-fast policy
//! guarantees IDs are in range before this module ever runs.

use candle_core::{Device, Tensor};
use candle_nn::{
    batch_norm, conv2d_no_bias, embedding, linear, BatchNorm, BatchNormConfig, Conv2d,
    Conv2dConfig, Dropout, Embedding, Linear, Module, ModuleT, VarBuilder,
};

use crate::error::ModelError;

/// Result type for model operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Hyperparameters of the DSConvE scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    /// Embedding image height (columns of the stacked image).
    pub emb_h: usize,
    /// Embedding image width (rows contributed by each of subject/relation).
    pub emb_w: usize,
    /// Convolution output channels.
    pub conv_channels: usize,
    /// Convolution kernel size (square, no padding).
    pub kernel: usize,
    /// Dropout on the stacked embedding image.
    pub embed_dropout: f32,
    /// Dropout on the convolution feature map.
    pub feature_dropout: f32,
    /// Dropout after the projection layer.
    pub proj_dropout: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            emb_h: 20,
            emb_w: 10,
            conv_channels: 32,
            kernel: 3,
            embed_dropout: 0.2,
            feature_dropout: 0.2,
            proj_dropout: 0.3,
        }
    }
}

impl ModelConfig {
    /// The embedding dimension `d = emb_w * emb_h`.
    pub fn embedding_dim(&self) -> usize {
        self.emb_w * self.emb_h
    }

    /// Flattened feature size after the valid (unpadded) convolution.
    pub fn flattened_size(&self) -> usize {
        (2 * self.emb_w - self.kernel + 1) * (self.emb_h - self.kernel + 1) * self.conv_channels
    }

    fn validate(&self) -> ModelResult<()> {
        if self.emb_h == 0 || self.emb_w == 0 || self.conv_channels == 0 {
            return Err(ModelError::InvalidConfig {
                message: "embedding dimensions and channel count must be non-zero".into(),
            });
        }
        if self.kernel == 0 || self.kernel > self.emb_h || self.kernel > 2 * self.emb_w {
            return Err(ModelError::InvalidConfig {
                message: format!(
                    "kernel {} does not fit the {}x{} stacked embedding image",
                    self.kernel,
                    2 * self.emb_w,
                    self.emb_h
                ),
            });
        }
        Ok(())
    }
}

/// Anything that can score all candidate objects for `(subject, relation)`
/// queries. The evaluator works against this seam so ranking logic is
/// testable with deterministic stub scorers.
pub trait Scorer {
    /// Number of candidate entities (the length of each score row).
    fn num_entities(&self) -> usize;

    /// One probability row of length `num_entities()` per query pair.
    fn score_candidates(&self, pairs: &[(u32, u32)]) -> ModelResult<Vec<Vec<f32>>>;
}

/// The DSConvE scoring model. Owns all trainable parameters; only the
/// trainer's optimizer mutates them.
#[derive(Debug)]
pub struct DsConvE {
    embed_e: Embedding,
    embed_r: Embedding,
    depthwise: Conv2d,
    pointwise: Conv2d,
    conv_bn: BatchNorm,
    proj: Linear,
    proj_bn: BatchNorm,
    entity_bias: Tensor,
    embed_dropout: Dropout,
    feature_dropout: Dropout,
    proj_dropout: Dropout,
    cfg: ModelConfig,
    num_entities: usize,
    device: Device,
}

impl DsConvE {
    /// Build a model with freshly initialized parameters registered in the
    /// given variable builder (backed by the trainer's `VarMap`).
    pub fn new(
        num_entities: usize,
        num_relations: usize,
        cfg: ModelConfig,
        vb: VarBuilder,
    ) -> ModelResult<Self> {
        cfg.validate()?;
        let d = cfg.embedding_dim();
        let device = vb.device().clone();

        let embed_e = embedding(num_entities, d, vb.pp("embed_e"))?;
        let embed_r = embedding(num_relations, d, vb.pp("embed_r"))?;

        // Depthwise pass keeps the single input channel (groups = in_channels
        // = 1 for the stacked image), pointwise 1x1 expands to conv_channels.
        let depthwise = conv2d_no_bias(
            1,
            1,
            cfg.kernel,
            Conv2dConfig::default(),
            vb.pp("depthwise"),
        )?;
        let pointwise = conv2d_no_bias(
            1,
            cfg.conv_channels,
            1,
            Conv2dConfig::default(),
            vb.pp("pointwise"),
        )?;

        // Batch stats in train mode, running stats in eval mode.
        let conv_bn = batch_norm(cfg.conv_channels, BatchNormConfig::default(), vb.pp("conv_bn"))?;
        let proj = linear(cfg.flattened_size(), d, vb.pp("proj"))?;
        let proj_bn = batch_norm(d, BatchNormConfig::default(), vb.pp("proj_bn"))?;
        let entity_bias = vb.get_with_hints(num_entities, "entity_bias", candle_nn::init::ZERO)?;

        Ok(Self {
            embed_e,
            embed_r,
            depthwise,
            pointwise,
            conv_bn,
            proj,
            proj_bn,
            entity_bias,
            embed_dropout: Dropout::new(cfg.embed_dropout),
            feature_dropout: Dropout::new(cfg.feature_dropout),
            proj_dropout: Dropout::new(cfg.proj_dropout),
            cfg,
            num_entities,
            device,
        })
    }

    /// The model configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.cfg
    }

    /// The device parameters live on.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Forward pass: one logit per candidate entity for each query row.
    ///
    /// `subjects` and `relations` are u32 ID tensors of shape `(batch,)`.
    /// Dropout is active only when `train` is set.
    pub fn forward(
        &self,
        subjects: &Tensor,
        relations: &Tensor,
        train: bool,
    ) -> ModelResult<Tensor> {
        let batch = subjects.dim(0)?;

        let s = self.embed_e.forward(subjects)?;
        let r = self.embed_r.forward(relations)?;
        let s = s.reshape((batch, self.cfg.emb_w, self.cfg.emb_h))?;
        let r = r.reshape((batch, self.cfg.emb_w, self.cfg.emb_h))?;

        // (batch, 1, 2*emb_w, emb_h) single-channel image.
        let image = Tensor::cat(&[&s, &r], 1)?.unsqueeze(1)?;
        let x = self.embed_dropout.forward(&image, train)?;

        let x = self.depthwise.forward(&x)?;
        let x = self.pointwise.forward(&x)?;
        let x = x.relu()?;
        let x = self.conv_bn.forward_t(&x, train)?;
        let x = self.feature_dropout.forward(&x, train)?;
        let x = x.flatten_from(1)?;

        let x = self.proj.forward(&x)?.relu()?;
        let x = self.proj_bn.forward_t(&x, train)?;
        let x = self.proj_dropout.forward(&x, train)?;

        // Score against every entity row at once (1-N scoring).
        let logits = x.matmul(&self.embed_e.embeddings().t()?)?;
        let logits = logits.broadcast_add(&self.entity_bias)?;
        Ok(logits)
    }

    /// Forward pass from plain ID slices, returning the logits tensor.
    pub fn forward_ids(&self, pairs: &[(u32, u32)], train: bool) -> ModelResult<Tensor> {
        let subjects: Vec<u32> = pairs.iter().map(|(s, _)| *s).collect();
        let relations: Vec<u32> = pairs.iter().map(|(_, r)| *r).collect();
        let subjects = Tensor::from_vec(subjects, pairs.len(), &self.device)?;
        let relations = Tensor::from_vec(relations, pairs.len(), &self.device)?;
        self.forward(&subjects, &relations, train)
    }
}

impl Scorer for DsConvE {
    fn num_entities(&self) -> usize {
        self.num_entities
    }

    fn score_candidates(&self, pairs: &[(u32, u32)]) -> ModelResult<Vec<Vec<f32>>> {
        let logits = self.forward_ids(pairs, false)?;
        let probs = candle_nn::ops::sigmoid(&logits)?;
        Ok(probs.to_vec2::<f32>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    fn small_config() -> ModelConfig {
        ModelConfig {
            emb_h: 4,
            emb_w: 2,
            conv_channels: 2,
            kernel: 3,
            ..Default::default()
        }
    }

    fn small_model(num_e: usize, num_r: usize) -> DsConvE {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        DsConvE::new(num_e, num_r, small_config(), vb).unwrap()
    }

    #[test]
    fn flattened_size_matches_valid_convolution() {
        let cfg = small_config();
        // Image is 4x4, kernel 3 => 2x2 per channel, 2 channels.
        assert_eq!(cfg.embedding_dim(), 8);
        assert_eq!(cfg.flattened_size(), 8);

        let default = ModelConfig::default();
        assert_eq!(default.embedding_dim(), 200);
        assert_eq!(default.flattened_size(), 18 * 18 * 32);
    }

    #[test]
    fn forward_produces_one_logit_per_entity() {
        let model = small_model(5, 2);
        // Both modes: eval uses running batch-norm stats, train uses batch
        // stats plus dropout.
        for train in [false, true] {
            let logits = model.forward_ids(&[(0, 0), (4, 1), (2, 0)], train).unwrap();
            assert_eq!(logits.dims(), &[3, 5]);
            for row in logits.to_vec2::<f32>().unwrap() {
                assert!(row.iter().all(|v| v.is_finite()));
            }
        }
    }

    #[test]
    fn batch_norm_layers_are_registered() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        DsConvE::new(5, 2, small_config(), vb).unwrap();

        let data = varmap.data().lock().unwrap();
        for name in [
            "conv_bn.running_mean",
            "conv_bn.running_var",
            "conv_bn.weight",
            "conv_bn.bias",
            "proj_bn.running_mean",
            "proj_bn.running_var",
        ] {
            assert!(data.contains_key(name), "missing variable {name}");
        }
    }

    #[test]
    fn scores_are_probabilities() {
        let model = small_model(6, 1);
        let rows = model.score_candidates(&[(1, 0), (5, 0)]).unwrap();
        assert_eq!(rows.len(), 2);
        for row in rows {
            assert_eq!(row.len(), 6);
            assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn eval_scoring_is_deterministic() {
        let model = small_model(4, 2);
        let a = model.score_candidates(&[(0, 1), (3, 0)]).unwrap();
        let b = model.score_candidates(&[(0, 1), (3, 0)]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn oversized_kernel_is_rejected() {
        let cfg = ModelConfig {
            emb_h: 2,
            emb_w: 2,
            kernel: 3,
            ..Default::default()
        };
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let err = DsConvE::new(4, 1, cfg, vb).unwrap_err();
        assert!(matches!(err, ModelError::InvalidConfig { .. }));
    }
}
