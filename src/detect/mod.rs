//! Person detection layer.
//!
//! This module is responsible for:
//! - Running a detector backend over the uploaded frame
//! - Filtering raw rows to confident person detections
//! - Denormalizing center boxes to absolute pixel boxes
//! - Removing duplicate boxes via non-max suppression
//! - Clamping survivors to the image bounds and dropping empty boxes
//!
//! Backends only run the network; everything after the raw rows is shared
//! post-processing so the stub and tract backends behave identically.

mod backend;
pub mod backends;
mod nms;
mod result;

use anyhow::Result;

pub use backend::DetectorBackend;
pub use backends::{StubDetector, TractDetector};
pub use result::{Detection, PersonBox, RawDetection};

use crate::config::{DetectionSettings, ModelSettings};

/// Build a detector from the configured model path. A `stub://` path
/// selects the synthetic backend so tests run without model files.
pub fn build_detector(
    models: &ModelSettings,
    detection: &DetectionSettings,
) -> Result<Box<dyn DetectorBackend>> {
    if let Some(scene) = models.detector_path.strip_prefix("stub://") {
        return Ok(Box::new(StubDetector::from_scene(scene)?));
    }
    Ok(Box::new(TractDetector::new(
        models.detector_path.as_str(),
        models.class_names_path.as_str(),
        detection.input_width,
        detection.input_height,
    )?))
}

/// Shared detection post-processing: person-class filter with a strict
/// confidence threshold, then denormalize, suppress, clamp.
pub fn person_boxes(
    raw: Vec<RawDetection>,
    person_class: usize,
    settings: &DetectionSettings,
    image_width: u32,
    image_height: u32,
) -> Vec<PersonBox> {
    let candidates: Vec<Detection> = raw
        .into_iter()
        .filter(|row| row.class_id == person_class && row.confidence > settings.confidence_threshold)
        .map(|row| row.to_pixel_box(image_width, image_height))
        .collect();

    nms::suppress(candidates, settings.nms_threshold)
        .iter()
        .filter_map(|detection| detection.clamp_to(image_width, image_height))
        .collect()
}
