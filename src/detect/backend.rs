use anyhow::Result;

use crate::detect::result::RawDetection;

/// Detector backend trait.
///
/// Backends run the network and hand back raw candidate rows; class
/// filtering, denormalization, suppression and clamping all happen in the
/// shared pipeline (`detect::person_boxes`) so every backend is
/// post-processed identically.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection over a full RGB frame.
    ///
    /// `pixels` is tightly-packed RGB8, `width * height * 3` bytes.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawDetection>>;

    /// Index of the person class in the backend's category list.
    fn person_class_id(&self) -> usize {
        0
    }

    /// Optional warm-up hook. Backends that lazily fault in weights run a
    /// throwaway frame here so the first request does not pay for it.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
