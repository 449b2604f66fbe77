//! Ethnicity classification layer.
//!
//! This module is responsible for:
//! - The 7-class label contract of the trained network (`labels`)
//! - Running a classifier backend over each person crop
//! - Producing the per-crop probability vector in output-layer order
//!
//! The classifier model is loaded once at startup; every request reuses
//! the same plan.

mod backend;
pub mod backends;
pub mod labels;

use anyhow::Result;

pub use backend::ClassifierBackend;
pub use backends::{StubClassifier, TractClassifier};
pub use labels::{Ethnicity, CLASS_COUNT, DETAIL_THRESHOLD};

/// Softmax output of one forward pass, indexed by [`Ethnicity::ALL`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbabilityVector(pub [f32; CLASS_COUNT]);

impl ProbabilityVector {
    /// Overall confidence: the maximum class probability.
    pub fn confidence(&self) -> f32 {
        self.0.iter().copied().fold(0.0, f32::max)
    }
}

/// Build a classifier from the configured model path. A `stub://` path
/// selects the synthetic backend so tests run without model files.
pub fn build_classifier(classifier_path: &str) -> Result<Box<dyn ClassifierBackend>> {
    if classifier_path.starts_with("stub://") {
        return Ok(Box::new(StubClassifier::new()));
    }
    Ok(Box::new(TractClassifier::new(classifier_path)?))
}
