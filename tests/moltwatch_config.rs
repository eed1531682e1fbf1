use std::sync::Mutex;

use tempfile::NamedTempFile;

use moltwatch::config::MoltwatchConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "MOLTWATCH_CONFIG",
        "MOLTWATCH_VIDEO_PATH",
        "MOLTWATCH_MODEL_PATH",
        "MOLTWATCH_CONFIDENCE",
        "MOLTWATCH_CLASSES",
        "MOLTWATCH_SYNC_URL",
        "MOLTWATCH_SYNC_KEY",
        "MOLTWATCH_SYNC_TABLE",
        "MOLTWATCH_HISTORY_CSV",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "video": { "path": "footage/tank_a.mp4" },
        "detector": {
            "model_path": "models/molt.onnx",
            "confidence_threshold": 0.4,
            "input_width": 800,
            "input_height": 800
        },
        "classes": [
            { "id": 0, "label": "intermolt" },
            { "id": 1, "label": "premolt_now" }
        ],
        "sync": {
            "base_url": "https://example.supabase.co",
            "api_key": "anon-key",
            "table": "molt_counts",
            "timeout_ms": 250
        },
        "annotate": { "draw_confidence": false, "draw_timestamp": true },
        "history": { "csv_path": "out/history.csv" }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("MOLTWATCH_CONFIG", file.path());
    std::env::set_var("MOLTWATCH_VIDEO_PATH", "footage/tank_b.mp4");
    std::env::set_var("MOLTWATCH_CONFIDENCE", "0.65");

    let cfg = MoltwatchConfig::load().expect("load config");

    assert_eq!(cfg.video_path, "footage/tank_b.mp4");
    assert_eq!(cfg.detector.model_path.as_deref(), Some("models/molt.onnx"));
    assert_eq!(cfg.detector.input_width, 800);
    assert_eq!(cfg.detector.input_height, 800);
    assert_eq!(cfg.pipeline.confidence_threshold, 0.65);
    assert_eq!(
        cfg.pipeline.classes.labels().collect::<Vec<_>>(),
        vec!["intermolt", "premolt_now"]
    );
    assert!(!cfg.pipeline.draw_confidence);
    assert!(cfg.pipeline.draw_timestamp);
    assert!(cfg.sync.enabled);
    assert_eq!(cfg.sync.base_url, "https://example.supabase.co");
    assert_eq!(cfg.sync.table, "molt_counts");
    assert_eq!(cfg.sync.timeout.as_millis(), 250);
    assert_eq!(cfg.history_csv_path, "out/history.csv");

    clear_env();
}

#[test]
fn classes_can_come_from_env_alone() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MOLTWATCH_CLASSES", "1:premolt_now,0:intermolt");

    let cfg = MoltwatchConfig::load().expect("load config");
    assert_eq!(cfg.pipeline.classes.label(1), Some("premolt_now"));
    assert_eq!(cfg.pipeline.classes.label(0), Some("intermolt"));
    // No sync backend configured: publishing stays off.
    assert!(!cfg.sync.enabled);
    assert_eq!(cfg.video_path, "stub://30");

    clear_env();
}

#[test]
fn missing_class_map_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let err = MoltwatchConfig::load().unwrap_err();
    assert!(err.to_string().contains("classes"));

    clear_env();
}

#[test]
fn invalid_class_labels_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MOLTWATCH_CLASSES", "1:Premolt Now");
    assert!(MoltwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn out_of_range_confidence_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MOLTWATCH_CLASSES", "1:premolt_now");
    std::env::set_var("MOLTWATCH_CONFIDENCE", "1.5");
    assert!(MoltwatchConfig::load().is_err());

    clear_env();
}
