use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;

/// Tract-based person detector.
///
/// Loads a single-shot ONNX detector once and keeps the optimized plan for
/// the life of the process. Frames are resized to the model input size,
/// scaled to 0..1 and laid out NCHW. The output is expected row-per-anchor:
/// `[cx, cy, w, h, objectness, class scores...]` with boxes normalized to
/// the source image.
pub struct TractDetector {
    model: RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>,
    input_width: u32,
    input_height: u32,
    person_class: usize,
}

impl TractDetector {
    /// Load the detector and resolve the person class index from the
    /// category-name list file (one name per line, `person` expected).
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        class_names_path: P,
        input_width: u32,
        input_height: u32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| {
                format!(
                    "failed to load detector model from {}",
                    model_path.display()
                )
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set detector input fact")?
            .into_optimized()
            .context("failed to optimize detector model")?
            .into_runnable()
            .context("failed to build runnable detector model")?;

        let person_class = person_class_from_names(class_names_path.as_ref())?;

        Ok(Self {
            model,
            input_width,
            input_height,
            person_class,
        })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let frame = RgbImage::from_raw(width, height, pixels.to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let resized = imageops::resize(
            &frame,
            self.input_width,
            self.input_height,
            imageops::FilterType::Triangle,
        );

        let width = self.input_width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                resized.as_raw()[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn parse_rows(&self, outputs: TVec<TValue>) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("detector produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("detector output tensor was not f32")?;

        let (rows, row_len) = match view.shape() {
            &[1, rows, row_len] => (rows, row_len),
            &[rows, row_len] => (rows, row_len),
            other => {
                return Err(anyhow!(
                    "unexpected detector output shape {:?}; expected [1, N, D] or [N, D]",
                    other
                ))
            }
        };
        if row_len < 6 {
            return Err(anyhow!(
                "detector rows carry {} values; expected box, objectness and class scores",
                row_len
            ));
        }

        let data: Vec<f32> = view.iter().copied().collect();
        let mut detections = Vec::new();
        for row in data.chunks_exact(row_len).take(rows) {
            let objectness = row[4];
            let mut class_id = 0usize;
            let mut class_score = 0.0f32;
            for (idx, score) in row[5..].iter().enumerate() {
                if *score > class_score {
                    class_id = idx;
                    class_score = *score;
                }
            }
            detections.push(RawDetection {
                cx: row[0],
                cy: row[1],
                w: row[2],
                h: row[3],
                confidence: objectness * class_score,
                class_id,
            });
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawDetection>> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("detector inference failed")?;
        self.parse_rows(outputs)
    }

    fn person_class_id(&self) -> usize {
        self.person_class
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = vec![0u8; (self.input_width * self.input_height * 3) as usize];
        self.detect(&blank, self.input_width, self.input_height)
            .map(|_| ())
            .context("detector warm-up failed")
    }
}

fn person_class_from_names(path: &Path) -> Result<usize> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read class names from {}", path.display()))?;
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .position(|line| line.eq_ignore_ascii_case("person"))
        .ok_or_else(|| anyhow!("no 'person' entry in {}", path.display()))
}
