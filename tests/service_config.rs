use std::sync::Mutex;

use tempfile::NamedTempFile;

use ethnia::config::ServiceConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ETHNIA_CONFIG",
        "ETHNIA_API_ADDR",
        "ETHNIA_CLASSIFIER_PATH",
        "ETHNIA_DETECTOR_PATH",
        "ETHNIA_CLASS_NAMES_PATH",
        "ETHNIA_MAX_UPLOAD_BYTES",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ServiceConfig::load().expect("load config");

    assert_eq!(cfg.api_addr, "127.0.0.1:8707");
    assert_eq!(cfg.models.classifier_path, "models/fairface.onnx");
    assert_eq!(cfg.models.detector_path, "models/person-yolo.onnx");
    assert_eq!(cfg.models.class_names_path, "models/coco.names");
    assert_eq!(cfg.detection.confidence_threshold, 0.5);
    assert_eq!(cfg.detection.nms_threshold, 0.4);
    assert_eq!(cfg.detection.input_width, 416);
    assert_eq!(cfg.detection.input_height, 416);
    assert_eq!(cfg.max_upload_bytes, 10 * 1024 * 1024);

    clear_env();
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "api": { "addr": "0.0.0.0:9000" },
        "models": {
            "classifier_path": "/opt/models/fairface-v2.onnx",
            "detector_path": "/opt/models/yolo.onnx",
            "class_names_path": "/opt/models/coco.names"
        },
        "detection": {
            "confidence_threshold": 0.6,
            "nms_threshold": 0.45,
            "input_width": 608,
            "input_height": 608
        },
        "limits": { "max_upload_bytes": 2097152 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("ETHNIA_CONFIG", file.path());
    std::env::set_var("ETHNIA_API_ADDR", "127.0.0.1:9100");
    std::env::set_var("ETHNIA_DETECTOR_PATH", "stub://crowd");

    let cfg = ServiceConfig::load().expect("load config");

    // Env wins over file.
    assert_eq!(cfg.api_addr, "127.0.0.1:9100");
    assert_eq!(cfg.models.detector_path, "stub://crowd");
    // File wins over defaults.
    assert_eq!(cfg.models.classifier_path, "/opt/models/fairface-v2.onnx");
    assert_eq!(cfg.models.class_names_path, "/opt/models/coco.names");
    assert_eq!(cfg.detection.confidence_threshold, 0.6);
    assert_eq!(cfg.detection.nms_threshold, 0.45);
    assert_eq!(cfg.detection.input_width, 608);
    assert_eq!(cfg.detection.input_height, 608);
    assert_eq!(cfg.max_upload_bytes, 2 * 1024 * 1024);

    clear_env();
}

#[test]
fn rejects_out_of_range_thresholds() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "detection": { "confidence_threshold": 1.5 } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("ETHNIA_CONFIG", file.path());
    assert!(ServiceConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_malformed_upload_limit() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ETHNIA_MAX_UPLOAD_BYTES", "lots");
    assert!(ServiceConfig::load().is_err());

    clear_env();
}
