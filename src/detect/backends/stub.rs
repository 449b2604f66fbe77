use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;

/// Stub backend for testing. Selected by a `stub://` detector path, so the
/// pipeline runs without model files on disk.
///
/// Every scene also emits rows the post-processing must reject (a
/// sub-threshold person, a non-person class, an overlapping duplicate) to
/// keep the filter and suppression paths honest.
pub struct StubDetector {
    scene: StubScene,
}

#[derive(Clone, Copy, Debug)]
enum StubScene {
    /// No persons at all.
    Empty,
    /// One centered person.
    Single,
    /// Two well-separated persons.
    Crowd,
}

impl StubDetector {
    /// `scene` is the part after `stub://`: `none`, `person` or `crowd`.
    pub fn from_scene(scene: &str) -> Result<Self> {
        let scene = match scene {
            "none" | "empty" => StubScene::Empty,
            "person" | "single" => StubScene::Single,
            "crowd" => StubScene::Crowd,
            other => return Err(anyhow!("unknown stub detector scene '{}'", other)),
        };
        Ok(Self { scene })
    }
}

fn person(cx: f32, cy: f32, w: f32, h: f32, confidence: f32) -> RawDetection {
    RawDetection {
        cx,
        cy,
        w,
        h,
        confidence,
        class_id: 0,
    }
}

impl DetectorBackend for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<RawDetection>> {
        let mut rows = vec![
            // Sub-threshold person: must be filtered out.
            person(0.5, 0.5, 0.2, 0.3, 0.2),
            // Confident non-person class (a dog): must be filtered out.
            RawDetection {
                cx: 0.5,
                cy: 0.8,
                w: 0.3,
                h: 0.2,
                confidence: 0.9,
                class_id: 16,
            },
        ];
        match self.scene {
            StubScene::Empty => {}
            StubScene::Single => {
                rows.push(person(0.5, 0.5, 0.5, 0.8, 0.92));
            }
            StubScene::Crowd => {
                rows.push(person(0.3, 0.5, 0.25, 0.6, 0.91));
                rows.push(person(0.72, 0.5, 0.25, 0.6, 0.84));
                // Near-duplicate of the first person: suppressed by NMS.
                rows.push(person(0.31, 0.5, 0.25, 0.6, 0.6));
            }
        }
        Ok(rows)
    }
}
