use anyhow::Result;

use crate::classify::backend::ClassifierBackend;
use crate::classify::ProbabilityVector;

/// Fixed distribution returned for every crop. Peaked above the detail
/// threshold on one class, with the rest below it.
const STUB_PROBABILITIES: [f32; 7] = [0.02, 0.05, 0.61, 0.08, 0.09, 0.05, 0.10];

/// Stub backend for testing. Selected by a `stub://` classifier path;
/// deterministic by construction.
#[derive(Default)]
pub struct StubClassifier;

impl StubClassifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClassifierBackend for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classify(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<ProbabilityVector> {
        Ok(ProbabilityVector(STUB_PROBABILITIES))
    }
}
