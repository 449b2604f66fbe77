use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_API_ADDR: &str = "127.0.0.1:8707";
const DEFAULT_CLASSIFIER_PATH: &str = "models/fairface.onnx";
const DEFAULT_DETECTOR_PATH: &str = "models/person-yolo.onnx";
const DEFAULT_CLASS_NAMES_PATH: &str = "models/coco.names";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_NMS_THRESHOLD: f32 = 0.4;
const DEFAULT_DETECTOR_INPUT: u32 = 416;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize, Default)]
struct ServiceConfigFile {
    api: Option<ApiConfigFile>,
    models: Option<ModelConfigFile>,
    detection: Option<DetectionConfigFile>,
    limits: Option<LimitConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    classifier_path: Option<String>,
    detector_path: Option<String>,
    class_names_path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    confidence_threshold: Option<f32>,
    nms_threshold: Option<f32>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct LimitConfigFile {
    max_upload_bytes: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api_addr: String,
    pub models: ModelSettings,
    pub detection: DetectionSettings,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub classifier_path: String,
    pub detector_path: String,
    pub class_names_path: String,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    /// Raw detections survive only strictly above this score.
    pub confidence_threshold: f32,
    /// IoU overlap above which a lower-confidence box is suppressed.
    pub nms_threshold: f32,
    pub input_width: u32,
    pub input_height: u32,
}

impl ServiceConfig {
    /// Load from the file named by `ETHNIA_CONFIG` (when set), then apply
    /// environment overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ETHNIA_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Same as [`load`](Self::load) with an explicit config file path.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => read_config_file(path)?,
            None => ServiceConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ServiceConfigFile) -> Self {
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let models = ModelSettings {
            classifier_path: file
                .models
                .as_ref()
                .and_then(|models| models.classifier_path.clone())
                .unwrap_or_else(|| DEFAULT_CLASSIFIER_PATH.to_string()),
            detector_path: file
                .models
                .as_ref()
                .and_then(|models| models.detector_path.clone())
                .unwrap_or_else(|| DEFAULT_DETECTOR_PATH.to_string()),
            class_names_path: file
                .models
                .and_then(|models| models.class_names_path)
                .unwrap_or_else(|| DEFAULT_CLASS_NAMES_PATH.to_string()),
        };
        let detection = DetectionSettings {
            confidence_threshold: file
                .detection
                .as_ref()
                .and_then(|detection| detection.confidence_threshold)
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            nms_threshold: file
                .detection
                .as_ref()
                .and_then(|detection| detection.nms_threshold)
                .unwrap_or(DEFAULT_NMS_THRESHOLD),
            input_width: file
                .detection
                .as_ref()
                .and_then(|detection| detection.input_width)
                .unwrap_or(DEFAULT_DETECTOR_INPUT),
            input_height: file
                .detection
                .and_then(|detection| detection.input_height)
                .unwrap_or(DEFAULT_DETECTOR_INPUT),
        };
        let max_upload_bytes = file
            .limits
            .and_then(|limits| limits.max_upload_bytes)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        Self {
            api_addr,
            models,
            detection,
            max_upload_bytes,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("ETHNIA_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(path) = std::env::var("ETHNIA_CLASSIFIER_PATH") {
            if !path.trim().is_empty() {
                self.models.classifier_path = path;
            }
        }
        if let Ok(path) = std::env::var("ETHNIA_DETECTOR_PATH") {
            if !path.trim().is_empty() {
                self.models.detector_path = path;
            }
        }
        if let Ok(path) = std::env::var("ETHNIA_CLASS_NAMES_PATH") {
            if !path.trim().is_empty() {
                self.models.class_names_path = path;
            }
        }
        if let Ok(limit) = std::env::var("ETHNIA_MAX_UPLOAD_BYTES") {
            let bytes: usize = limit
                .parse()
                .map_err(|_| anyhow!("ETHNIA_MAX_UPLOAD_BYTES must be an integer byte count"))?;
            self.max_upload_bytes = bytes;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.detection.confidence_threshold) {
            return Err(anyhow!("detection confidence threshold must be in [0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.detection.nms_threshold) {
            return Err(anyhow!("nms overlap threshold must be in [0, 1]"));
        }
        if self.detection.input_width == 0 || self.detection.input_height == 0 {
            return Err(anyhow!("detector input size must be non-zero"));
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("upload limit must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_file(ServiceConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<ServiceConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
