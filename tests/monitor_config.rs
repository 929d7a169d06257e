use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use live_monitor::config::MonitorConfig;
use live_monitor::ingest::FacingMode;
use live_monitor::poller::ChannelId;
use live_monitor::SnapshotFormat;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "MONITOR_CONFIG",
        "MONITOR_DETECT_URL",
        "MONITOR_CHANNEL_BASE_URL",
        "MONITOR_POLL_FPS",
        "MONITOR_RETRY_BACKOFF_MS",
        "MONITOR_CHANNELS",
        "MONITOR_FONT_PATH",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = MonitorConfig::load().expect("load config");
    assert_eq!(cfg.detection.url, "http://127.0.0.1:8080/");
    assert_eq!(cfg.detection.timeout, Duration::from_millis(5000));
    assert_eq!(cfg.dashboard.base_url, "http://127.0.0.1:8080");
    assert_eq!(cfg.dashboard.fps_target, 5);
    assert_eq!(cfg.dashboard.retry_backoff, Duration::from_millis(10_000));
    assert!(cfg.dashboard.channels.is_empty());
    assert_eq!(cfg.camera.target_fps, 30);
    assert_eq!(cfg.camera.format, SnapshotFormat::Jpeg);
    assert_eq!(cfg.camera.constraints.width.ideal, 1920);
    assert_eq!(cfg.camera.constraints.height.ideal, 1080);
    assert_eq!(cfg.catalog().enumerate_video_inputs().len(), 1);
    assert!(cfg.font_path.is_none());
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "detection": { "url": "http://detector.local:9000/detect", "timeout_ms": 2500 },
        "camera": {
            "devices": [
                { "device_id": "front", "label": "Front", "url": "stub://front", "facing": "user" },
                { "device_id": "rear", "label": "Rear", "url": "stub://rear", "facing": "environment" },
                { "device_id": "mic", "kind": "audioinput", "url": "stub://mic" }
            ],
            "constraints": {
                "width": { "min": 320, "ideal": 640, "max": 1280 },
                "height": { "min": 240, "ideal": 480, "max": 720 }
            },
            "target_fps": 12,
            "format": "image/png"
        },
        "dashboard": {
            "base_url": "http://cams.local/still",
            "fps_target": 2,
            "retry_backoff_ms": 3000,
            "channels": ["north/gate", "south/dock"]
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("MONITOR_CONFIG", file.path());
    std::env::set_var("MONITOR_POLL_FPS", "4");
    std::env::set_var("MONITOR_CHANNELS", "east/lobby, north/gate");

    let cfg = MonitorConfig::load().expect("load config");

    assert_eq!(cfg.detection.url, "http://detector.local:9000/detect");
    assert_eq!(cfg.detection.timeout, Duration::from_millis(2500));
    assert_eq!(cfg.camera.target_fps, 12);
    assert_eq!(cfg.camera.format, SnapshotFormat::Png);
    assert_eq!(cfg.camera.constraints.width.ideal, 640);
    assert_eq!(cfg.dashboard.base_url, "http://cams.local/still");
    assert_eq!(cfg.dashboard.fps_target, 4);
    assert_eq!(cfg.dashboard.retry_backoff, Duration::from_millis(3000));
    assert_eq!(
        cfg.dashboard.channels,
        vec![ChannelId::new("east/lobby"), ChannelId::new("north/gate")]
    );

    let catalog = cfg.catalog();
    let inputs = catalog.enumerate_video_inputs();
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[1].facing, Some(FacingMode::Environment));
    assert_eq!(cfg.poll_policy().success_delay(), Duration::from_millis(250));

    clear_env();
}

#[test]
fn rejects_invalid_settings() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MONITOR_POLL_FPS", "0");
    assert!(MonitorConfig::load().is_err());
    clear_env();

    std::env::set_var("MONITOR_RETRY_BACKOFF_MS", "soon");
    assert!(MonitorConfig::load().is_err());
    clear_env();

    std::env::set_var("MONITOR_DETECT_URL", "ftp://detector");
    assert!(MonitorConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "camera": { "format": "image/gif" } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("MONITOR_CONFIG", file.path());
    assert!(MonitorConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "camera": { "devices": [
        { "device_id": "cam", "url": "stub://a" },
        { "device_id": "cam", "url": "stub://b" }
    ] } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("MONITOR_CONFIG", file.path());
    assert!(MonitorConfig::load().is_err());
    clear_env();
}
