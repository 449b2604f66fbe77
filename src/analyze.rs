//! Request pipeline and response assembly.
//!
//! `AnalysisEngine` owns both model backends for the life of the process:
//! decode the upload, detect persons, crop each surviving box, classify
//! every crop, and assemble the response envelope. One crop's
//! classification failure becomes an error slot in `results`; it does not
//! abort the rest of the batch.

use anyhow::{Context, Result};
use image::imageops;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::classify::{self, ClassifierBackend, Ethnicity, ProbabilityVector};
use crate::config::{DetectionSettings, ServiceConfig};
use crate::detect::{self, DetectorBackend, PersonBox};
use crate::ingest;

pub struct AnalysisEngine {
    detector: Box<dyn DetectorBackend>,
    classifier: Box<dyn ClassifierBackend>,
    detection: DetectionSettings,
    person_class: usize,
}

impl AnalysisEngine {
    /// Build both backends from config. Models load here, once; requests
    /// only run inference.
    pub fn from_config(cfg: &ServiceConfig) -> Result<Self> {
        let detector =
            detect::build_detector(&cfg.models, &cfg.detection).context("build detector")?;
        let classifier =
            classify::build_classifier(&cfg.models.classifier_path).context("build classifier")?;
        let person_class = detector.person_class_id();
        log::info!(
            "analysis engine ready (detector: {}, classifier: {})",
            detector.name(),
            classifier.name()
        );
        Ok(Self {
            detector,
            classifier,
            detection: cfg.detection.clone(),
            person_class,
        })
    }

    /// Fault model weights in before the first request.
    pub fn warm_up(&mut self) -> Result<()> {
        self.detector.warm_up()?;
        self.classifier.warm_up()
    }

    /// Run the full pipeline over one uploaded image.
    pub fn analyze(&mut self, image_bytes: &[u8]) -> Result<AnalysisReport> {
        let image = ingest::decode_rgb(image_bytes)?;
        let (width, height) = image.dimensions();

        let raw = self
            .detector
            .detect(image.as_raw(), width, height)
            .context("person detection failed")?;
        let persons = detect::person_boxes(raw, self.person_class, &self.detection, width, height);
        log::debug!(
            "{} person box(es) after suppression in {}x{} upload",
            persons.len(),
            width,
            height
        );

        let mut results = Vec::with_capacity(persons.len());
        for (person_id, person) in persons.iter().enumerate() {
            let crop =
                imageops::crop_imm(&image, person.x, person.y, person.width, person.height)
                    .to_image();
            match self
                .classifier
                .classify(crop.as_raw(), crop.width(), crop.height())
            {
                Ok(probabilities) => {
                    results.push(PersonResult::Analyzed(PersonAnalysis::new(
                        person_id,
                        person,
                        probabilities,
                    )));
                }
                Err(err) => {
                    log::warn!("classification failed for person {}: {:#}", person_id, err);
                    results.push(PersonResult::Failed(PersonFailure {
                        error: format!("{err:#}"),
                        person_id,
                        bounding_box: person.to_array(),
                        detection_confidence: person.confidence,
                    }));
                }
            }
        }

        Ok(AnalysisReport {
            persons_count: persons.len(),
            results,
        })
    }
}

// ----------------------------------------------------------------------------
// Response envelope
// ----------------------------------------------------------------------------

#[derive(Debug, serde::Serialize)]
pub struct AnalysisReport {
    pub persons_count: usize,
    pub results: Vec<PersonResult>,
}

#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
pub enum PersonResult {
    Analyzed(PersonAnalysis),
    Failed(PersonFailure),
}

#[derive(Debug, serde::Serialize)]
pub struct PersonAnalysis {
    pub predictions: PredictionMap,
    pub confidence: f32,
    pub details: DetailMap,
    #[serde(rename = "box")]
    pub bounding_box: [u32; 4],
    pub person_id: usize,
    pub detection_confidence: f32,
}

impl PersonAnalysis {
    fn new(person_id: usize, person: &PersonBox, probabilities: ProbabilityVector) -> Self {
        Self {
            predictions: PredictionMap(probabilities),
            confidence: probabilities.confidence(),
            details: DetailMap(probabilities),
            bounding_box: person.to_array(),
            person_id,
            detection_confidence: person.confidence,
        }
    }
}

/// One slot of `results` when classification of that crop failed.
#[derive(Debug, serde::Serialize)]
pub struct PersonFailure {
    pub error: String,
    pub person_id: usize,
    #[serde(rename = "box")]
    pub bounding_box: [u32; 4],
    pub detection_confidence: f32,
}

/// `predictions` map in output-layer label order. Hand-serialized:
/// `serde_json`'s map type would alphabetize the keys.
#[derive(Clone, Copy, Debug)]
pub struct PredictionMap(pub ProbabilityVector);

impl Serialize for PredictionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Ethnicity::ALL.len()))?;
        for (ethnicity, probability) in Ethnicity::ALL.iter().zip(self.0 .0) {
            map.serialize_entry(ethnicity.label(), &probability)?;
        }
        map.end()
    }
}

/// `details` map: templated description per label, same key order as
/// `predictions`.
#[derive(Clone, Copy, Debug)]
pub struct DetailMap(pub ProbabilityVector);

impl Serialize for DetailMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Ethnicity::ALL.len()))?;
        for (ethnicity, probability) in Ethnicity::ALL.iter().zip(self.0 .0) {
            map.serialize_entry(ethnicity.label(), &ethnicity.detail_text(probability))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelSettings;
    use std::io::Cursor;

    fn stub_config(detector_scene: &str) -> ServiceConfig {
        let mut cfg = ServiceConfig::default();
        cfg.models = ModelSettings {
            classifier_path: "stub://classifier".to_string(),
            detector_path: format!("stub://{detector_scene}"),
            class_names_path: "stub://names".to_string(),
        };
        cfg
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(width, height, image::Rgb([120, 140, 160]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn empty_scene_reports_zero_persons() {
        let mut engine = AnalysisEngine::from_config(&stub_config("none")).unwrap();
        let report = engine.analyze(&png_bytes(64, 64)).unwrap();
        assert_eq!(report.persons_count, 0);
        assert!(report.results.is_empty());
    }

    #[test]
    fn each_person_gets_one_result_slot() {
        let mut engine = AnalysisEngine::from_config(&stub_config("crowd")).unwrap();
        let report = engine.analyze(&png_bytes(96, 96)).unwrap();
        assert_eq!(report.persons_count, 2);
        assert_eq!(report.results.len(), 2);

        for (idx, result) in report.results.iter().enumerate() {
            let PersonResult::Analyzed(person) = result else {
                panic!("stub classification should not fail");
            };
            assert_eq!(person.person_id, idx);
            let sum: f32 = person.predictions.0 .0.iter().sum();
            assert!((sum - 1.0).abs() < 1e-3);
            assert!((person.confidence - person.predictions.0.confidence()).abs() < 1e-6);
            let [x, y, w, h] = person.bounding_box;
            assert!(x + w <= 96);
            assert!(y + h <= 96);
        }
    }

    #[test]
    fn analysis_is_deterministic() {
        let mut engine = AnalysisEngine::from_config(&stub_config("person")).unwrap();
        let bytes = png_bytes(64, 64);
        let a = serde_json::to_string(&engine.analyze(&bytes).unwrap()).unwrap();
        let b = serde_json::to_string(&engine.analyze(&bytes).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn garbage_bytes_fail_to_analyze() {
        let mut engine = AnalysisEngine::from_config(&stub_config("person")).unwrap();
        assert!(engine.analyze(b"not an image").is_err());
    }

    #[test]
    fn prediction_map_preserves_label_order() {
        let mut engine = AnalysisEngine::from_config(&stub_config("person")).unwrap();
        let report = engine.analyze(&png_bytes(64, 64)).unwrap();
        let body = serde_json::to_string(&report).unwrap();

        let positions: Vec<usize> = Ethnicity::ALL
            .iter()
            .map(|e| body.find(&format!("\"{}\":", e.label())).expect("label present"))
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn failure_slots_serialize_with_an_error_key() {
        let failure = PersonResult::Failed(PersonFailure {
            error: "classifier output width is 3, expected 7 classes".to_string(),
            person_id: 1,
            bounding_box: [4, 5, 6, 7],
            detection_confidence: 0.8,
        });
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(
            value["error"],
            "classifier output width is 3, expected 7 classes"
        );
        assert_eq!(value["person_id"], 1);
        assert_eq!(value["box"][0], 4);
    }
}
