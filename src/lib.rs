//! # heka
//!
//! Convolutional knowledge-graph embedding (DSConvE) for link prediction:
//! learn dense entity/relation vectors from (subject, relation, object)
//! triples and score candidate completions of partial triples.
//!
//! ## Architecture
//!
//! - **Preprocessing** (`vocab`, `triples`, `dataset`, `artifact`): raw
//!   label triples → dense-ID vocabulary → multi-label 1-N training
//!   representation, persisted as bincode artifacts
//! - **Scoring model** (`model`): embedding lookup → depthwise-separable
//!   2-D convolution → projection → dot product against all entities
//! - **Training** (`train`): label-smoothed binary cross-entropy over
//!   logits, AdamW, seedable shuffling, safetensors checkpoints
//! - **Evaluation** (`eval`): filtered MRR and Hits@{1,3,10} with a
//!   deterministic tie-break
//!
//! ## Library usage
//!
//! ```no_run
//! use std::path::Path;
//! use candle_core::Device;
//! use heka::artifact::{preprocess_train, preprocess_eval};
//! use heka::model::ModelConfig;
//! use heka::train::{TrainConfig, Trainer};
//!
//! let train = preprocess_train(Path::new("train.txt")).unwrap();
//! let valid = preprocess_eval(&train.vocab, Path::new("valid.txt")).unwrap();
//! let mut trainer =
//!     Trainer::new(&train, ModelConfig::default(), TrainConfig::default(), &Device::Cpu)
//!         .unwrap();
//! let report = trainer.run(&train, &valid).unwrap();
//! println!("{report}");
//! ```

pub mod artifact;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod model;
pub mod train;
pub mod triples;
pub mod vocab;
