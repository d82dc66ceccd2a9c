//! Errors surfaced by the asset pipeline.
//!
//! Everything else in the crate propagates [`anyhow::Error`]; a failed model
//! load is the one condition callers may want to match on, so it gets a type.

use thiserror::Error;

/// Fetching or decoding a model failed.
///
/// Network failures and malformed files are not told apart: both leave the
/// scene without the model.
#[derive(Debug, Error)]
#[error("failed to load model `{path}`: {source}")]
pub struct LoadFailure {
    pub path: String,
    #[source]
    pub source: anyhow::Error,
}

impl LoadFailure {
    pub fn new(path: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}
