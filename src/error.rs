//! Rich diagnostic error types for heka.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes and help text so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for heka.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum HekaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Prep(#[from] PrepError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Train(#[from] TrainError),
}

// ---------------------------------------------------------------------------
// Preprocessing errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PrepError {
    #[error("malformed triple on line {line}: expected 3 tab-separated fields, got {fields}")]
    #[diagnostic(
        code(heka::prep::malformed_triple),
        help(
            "Each line of a triple file must be `subject<TAB>relation<TAB>object`. \
             Check the file for stray tabs, missing fields, or a wrong separator."
        )
    )]
    MalformedTriple { line: usize, fields: usize },

    #[error("unknown {role} label \"{label}\" on line {line}")]
    #[diagnostic(
        code(heka::prep::unknown_label),
        help(
            "The label does not appear in the training vocabulary. Evaluation \
             triples may only reference entities and relations seen during \
             training preprocessing; an unseen label can never be ranked \
             correctly, and silently dropping the triple would inflate the \
             reported metrics. Remove the triple from the evaluation file or \
             add supporting training data and re-run `preprocess train`."
        )
    )]
    UnknownLabel {
        label: String,
        role: LabelRole,
        line: usize,
    },

    #[error("I/O error on {path}: {source}")]
    #[diagnostic(
        code(heka::prep::io),
        help("Check that the path exists, is readable/writable, and the disk is not full.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode artifact: {message}")]
    #[diagnostic(
        code(heka::prep::encode),
        help("This is an internal serialization failure; please file a bug report.")
    )]
    Encode { message: String },

    #[error("failed to decode artifact {path}: {message}")]
    #[diagnostic(
        code(heka::prep::decode),
        help(
            "The file is not a valid heka artifact, or was produced by an \
             incompatible version. Re-run the preprocessing step."
        )
    )]
    Decode { path: String, message: String },
}

/// Whether an unknown label appeared in an entity or a relation position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelRole {
    Entity,
    Relation,
}

impl std::fmt::Display for LabelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelRole::Entity => write!(f, "entity"),
            LabelRole::Relation => write!(f, "relation"),
        }
    }
}

// ---------------------------------------------------------------------------
// Model errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("tensor engine error: {source}")]
    #[diagnostic(
        code(heka::model::tensor),
        help(
            "The underlying tensor engine reported an error. This usually \
             indicates an invalid model configuration (e.g. a convolution \
             kernel larger than the embedding image)."
        )
    )]
    Tensor {
        #[from]
        source: candle_core::Error,
    },

    #[error("invalid model configuration: {message}")]
    #[diagnostic(
        code(heka::model::invalid_config),
        help("Check the ModelConfig fields. {message}")
    )]
    InvalidConfig { message: String },
}

// ---------------------------------------------------------------------------
// Training errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TrainError {
    #[error(
        "shape mismatch: target vector length {actual} but vocabulary has {expected} entities"
    )]
    #[diagnostic(
        code(heka::train::shape_mismatch),
        help(
            "The training artifact and the evaluation artifact were built \
             against different vocabularies. Re-run `preprocess valid` with \
             the training artifact you are training against."
        )
    )]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("checkpoint error at {path}: {message}")]
    #[diagnostic(
        code(heka::train::checkpoint),
        help("Check that the checkpoint directory exists and is writable.")
    )]
    Checkpoint { path: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Prep(#[from] PrepError),
}

/// Convenience alias for functions returning heka results.
pub type HekaResult<T> = std::result::Result<T, HekaError>;
