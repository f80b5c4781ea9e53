//! End-to-end tests for the heka pipeline.
//!
//! These exercise the full path from raw triple files through preprocessing
//! artifacts to a short training run with filtered evaluation, validating
//! that the vocabulary, dataset, trainer, and evaluator all work together.

use std::fs;
use std::path::{Path, PathBuf};

use candle_core::Device;

use heka::artifact::{self, EvalArtifact, TrainArtifact};
use heka::dataset::KnownObjects;
use heka::error::PrepError;
use heka::eval::evaluate;
use heka::model::ModelConfig;
use heka::train::{TrainConfig, Trainer};
use heka::triples::Triple;

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn small_model_config() -> ModelConfig {
    ModelConfig {
        emb_h: 6,
        emb_w: 3,
        conv_channels: 4,
        kernel: 3,
        ..Default::default()
    }
}

#[test]
fn preprocess_roundtrip_through_artifacts() {
    let dir = tempfile::TempDir::new().unwrap();
    let train_path = write_file(
        dir.path(),
        "train.txt",
        "a\trel\tb\na\trel\tc\nd\trel\tb\n",
    );
    let valid_path = write_file(dir.path(), "valid.txt", "a\trel\tb\nd\trel\tb\n");

    let train = artifact::preprocess_train(&train_path).unwrap();
    assert_eq!(train.vocab.entity_count(), 4);
    assert_eq!(train.vocab.relation_count(), 1);
    assert_eq!(train.dataset.len(), 2);

    let valid = artifact::preprocess_eval(&train.vocab, &valid_path).unwrap();
    assert_eq!(valid.triples, vec![Triple::new(0, 0, 1), Triple::new(3, 0, 1)]);

    // Round-trip both artifacts through disk.
    let train_out = dir.path().join("train.heka");
    let valid_out = dir.path().join("valid.heka");
    artifact::save(&train, &train_out).unwrap();
    artifact::save(&valid, &valid_out).unwrap();
    let train_loaded: TrainArtifact = artifact::load(&train_out).unwrap();
    let valid_loaded: EvalArtifact = artifact::load(&valid_out).unwrap();
    assert_eq!(train, train_loaded);
    assert_eq!(valid, valid_loaded);
}

#[test]
fn eval_preprocessing_rejects_unknown_labels() {
    let dir = tempfile::TempDir::new().unwrap();
    let train_path = write_file(dir.path(), "train.txt", "a\trel\tb\n");
    let valid_path = write_file(dir.path(), "valid.txt", "a\trel\tb\nunknown\trel\tb\n");

    let train = artifact::preprocess_train(&train_path).unwrap();
    let err = artifact::preprocess_eval(&train.vocab, &valid_path).unwrap_err();
    match err {
        PrepError::UnknownLabel { label, line, .. } => {
            assert_eq!(label, "unknown");
            assert_eq!(line, 2);
        }
        other => panic!("expected UnknownLabel, got {other:?}"),
    }
}

#[test]
fn malformed_training_file_aborts_preprocessing() {
    let dir = tempfile::TempDir::new().unwrap();
    let train_path = write_file(dir.path(), "train.txt", "a\trel\tb\nbroken line\n");
    let err = artifact::preprocess_train(&train_path).unwrap_err();
    assert!(matches!(err, PrepError::MalformedTriple { line: 2, .. }));
}

#[test]
fn short_training_run_produces_valid_metrics_and_checkpoints() {
    let dir = tempfile::TempDir::new().unwrap();
    let train_path = write_file(
        dir.path(),
        "train.txt",
        "a\trel\tb\na\trel\tc\nd\trel\tb\nb\trel2\ta\nc\trel2\td\n",
    );
    let valid_path = write_file(dir.path(), "valid.txt", "a\trel\tb\nb\trel2\ta\n");

    let train = artifact::preprocess_train(&train_path).unwrap();
    let valid = artifact::preprocess_eval(&train.vocab, &valid_path).unwrap();

    let checkpoint_dir = dir.path().join("checkpoints");
    let cfg = TrainConfig {
        batch_size: 2,
        epochs: 3,
        label_smooth: 0.1,
        lr: 1e-2,
        seed: Some(7),
        eval_every: 3,
        checkpoint_dir: Some(checkpoint_dir.clone()),
    };

    let mut trainer = Trainer::new(&train, small_model_config(), cfg, &Device::Cpu).unwrap();
    let report = trainer.run(&train, &valid).unwrap();

    assert_eq!(report.evaluated, 2);
    assert!(report.mrr > 0.0 && report.mrr <= 1.0);
    assert!(report.hits_at_1 <= report.hits_at_3);
    assert!(report.hits_at_3 <= report.hits_at_10);

    assert!(checkpoint_dir.join("epoch_003.safetensors").exists());
}

#[test]
fn mispaired_artifacts_fail_fast() {
    let dir = tempfile::TempDir::new().unwrap();
    let small = write_file(dir.path(), "small.txt", "a\trel\tb\n");
    let large = write_file(dir.path(), "large.txt", "a\trel\tb\nc\trel\td\ne\trel\tf\n");

    let train_small = artifact::preprocess_train(&small).unwrap();
    let train_large = artifact::preprocess_train(&large).unwrap();
    let valid_large = artifact::preprocess_eval(&train_large.vocab, &large).unwrap();

    let cfg = TrainConfig {
        epochs: 1,
        ..Default::default()
    };
    let mut trainer =
        Trainer::new(&train_small, small_model_config(), cfg, &Device::Cpu).unwrap();
    assert!(trainer.run(&train_small, &valid_large).is_err());
}

#[test]
fn trained_model_evaluates_through_the_scorer_seam() {
    let dir = tempfile::TempDir::new().unwrap();
    let train_path = write_file(
        dir.path(),
        "train.txt",
        "a\trel\tb\na\trel\tc\nd\trel\tb\n",
    );
    let train = artifact::preprocess_train(&train_path).unwrap();

    let cfg = TrainConfig {
        batch_size: 2,
        epochs: 2,
        seed: Some(3),
        eval_every: 10, // skip mid-run evaluation
        checkpoint_dir: None,
        ..Default::default()
    };
    let mut trainer = Trainer::new(&train, small_model_config(), cfg, &Device::Cpu).unwrap();

    // Evaluate the training split against itself: every (a, rel) completion
    // other than the target is filtered, so ranks stay well-defined.
    let valid = EvalArtifact {
        vocab: train.vocab.clone(),
        triples: train.triples.clone(),
    };
    let report = trainer.run(&train, &valid).unwrap();
    assert_eq!(report.evaluated, 3);
    assert!(report.mrr > 0.0 && report.mrr <= 1.0);

    // Deterministic re-evaluation with the same model state.
    let known = KnownObjects::build([train.triples.as_slice()]);
    let a = evaluate(trainer.model(), &known, &train.triples, 4).unwrap();
    let b = evaluate(trainer.model(), &known, &train.triples, 4).unwrap();
    assert_eq!(a, b);
}
