use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops, RgbImage};
use tract_onnx::prelude::*;

use crate::classify::backend::ClassifierBackend;
use crate::classify::labels::CLASS_COUNT;
use crate::classify::ProbabilityVector;

/// Side length the classifier network was trained on.
const INPUT_SIZE: u32 = 224;

/// Tract-based ethnicity classifier.
///
/// Loads the ONNX export of the trained CNN once and keeps the optimized
/// plan for the life of the process. Crops are resized to 224x224, scaled
/// to 0..1 and laid out NHWC: the network is a channel-last Keras export,
/// unlike the NCHW detector.
pub struct TractClassifier {
    model: RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>,
}

impl TractClassifier {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| {
                format!(
                    "failed to load classifier model from {}",
                    model_path.display()
                )
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3),
                ),
            )
            .context("failed to set classifier input fact")?
            .into_optimized()
            .context("failed to optimize classifier model")?
            .into_runnable()
            .context("failed to build runnable classifier model")?;

        Ok(Self { model })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("crop dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let crop = RgbImage::from_raw(width, height, pixels.to_vec())
            .ok_or_else(|| anyhow!("crop buffer does not match its dimensions"))?;
        let resized = imageops::resize(
            &crop,
            INPUT_SIZE,
            INPUT_SIZE,
            imageops::FilterType::Triangle,
        );

        let side = INPUT_SIZE as usize;
        let input =
            tract_ndarray::Array4::from_shape_fn((1, side, side, 3), |(_, y, x, channel)| {
                let idx = (y * side + x) * 3 + channel;
                resized.as_raw()[idx] as f32 / 255.0
            });

        Ok(input.into_tensor())
    }

    fn first_row(&self, outputs: TVec<TValue>) -> Result<ProbabilityVector> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("classifier produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("classifier output tensor was not f32")?;

        let width = view
            .shape()
            .last()
            .copied()
            .ok_or_else(|| anyhow!("classifier output has no dimensions"))?;
        if width != CLASS_COUNT {
            return Err(anyhow!(
                "classifier output width is {}, expected {} classes",
                width,
                CLASS_COUNT
            ));
        }

        // First (only) row of the batch.
        let mut probabilities = [0.0f32; CLASS_COUNT];
        for (slot, value) in probabilities.iter_mut().zip(view.iter()) {
            *slot = *value;
        }
        Ok(ProbabilityVector(probabilities))
    }
}

impl ClassifierBackend for TractClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn classify(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<ProbabilityVector> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("classifier inference failed")?;
        self.first_row(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = vec![0u8; (INPUT_SIZE * INPUT_SIZE * 3) as usize];
        self.classify(&blank, INPUT_SIZE, INPUT_SIZE)
            .map(|_| ())
            .context("classifier warm-up failed")
    }
}
