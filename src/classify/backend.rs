use anyhow::Result;

use crate::classify::ProbabilityVector;

/// Classifier backend trait.
///
/// Backends take an RGB crop of any size, run the network and return the
/// 7-way probability vector in output-layer order. Each call is an
/// independent forward pass; there is no batching across crops.
pub trait ClassifierBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Classify one RGB crop. `pixels` is tightly-packed RGB8,
    /// `width * height * 3` bytes.
    fn classify(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<ProbabilityVector>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
