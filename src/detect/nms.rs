//! Non-max suppression over person candidates.
//!
//! Greedy, highest confidence first: a candidate is kept when its IoU with
//! every already-kept box stays below the overlap threshold.

use crate::detect::result::Detection;

pub fn suppress(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        if kept.iter().all(|best| best.iou(&candidate) < iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}
