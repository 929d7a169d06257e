use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::DetectionClientConfig;
use crate::ingest::{Constraints, DeviceCatalog, DeviceInfo, DeviceKind};
use crate::pipeline::PipelineSettings;
use crate::poller::{ChannelId, PollPolicy};
use crate::snapshot::SnapshotFormat;

const DEFAULT_DETECT_URL: &str = "http://127.0.0.1:8080/";
const DEFAULT_CHANNEL_BASE_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_POLL_FPS: u32 = 5;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 10_000;
const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_FORMAT: &str = "image/jpeg";
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_DEVICE_ID: &str = "stub-camera";
const DEFAULT_DEVICE_URL: &str = "stub://camera";

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    detection: Option<DetectionConfigFile>,
    camera: Option<CameraConfigFile>,
    dashboard: Option<DashboardConfigFile>,
    render: Option<RenderConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    devices: Option<Vec<DeviceInfo>>,
    constraints: Option<Constraints>,
    target_fps: Option<u32>,
    format: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DashboardConfigFile {
    base_url: Option<String>,
    fps_target: Option<u32>,
    retry_backoff_ms: Option<u64>,
    timeout_ms: Option<u64>,
    channels: Option<Vec<ChannelId>>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub detection: DetectionSettings,
    pub camera: CameraSettings,
    pub dashboard: DashboardSettings,
    /// TTF/OTF font for box labels. Without one, labels render as plain tabs.
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub devices: Vec<DeviceInfo>,
    pub constraints: Constraints,
    pub target_fps: u32,
    pub format: SnapshotFormat,
}

#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub base_url: String,
    pub fps_target: u32,
    pub retry_backoff: Duration,
    pub timeout: Duration,
    pub channels: Vec<ChannelId>,
}

impl MonitorConfig {
    /// Defaults, then the JSON file named by `MONITOR_CONFIG`, then
    /// `MONITOR_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MONITOR_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let detection_file = file.detection.unwrap_or_default();
        let detection = DetectionSettings {
            url: detection_file
                .url
                .unwrap_or_else(|| DEFAULT_DETECT_URL.to_string()),
            timeout: Duration::from_millis(detection_file.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
        };

        let camera_file = file.camera.unwrap_or_default();
        let format = camera_file
            .format
            .as_deref()
            .unwrap_or(DEFAULT_FORMAT)
            .parse::<SnapshotFormat>()
            .map_err(|e| anyhow!("camera.format: {}", e))?;
        let camera = CameraSettings {
            devices: camera_file.devices.unwrap_or_else(default_devices),
            constraints: camera_file.constraints.unwrap_or_default(),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
            format,
        };

        let dashboard_file = file.dashboard.unwrap_or_default();
        let dashboard = DashboardSettings {
            base_url: dashboard_file
                .base_url
                .unwrap_or_else(|| DEFAULT_CHANNEL_BASE_URL.to_string()),
            fps_target: dashboard_file.fps_target.unwrap_or(DEFAULT_POLL_FPS),
            retry_backoff: Duration::from_millis(
                dashboard_file
                    .retry_backoff_ms
                    .unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
            ),
            timeout: Duration::from_millis(dashboard_file.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
            channels: dashboard_file.channels.unwrap_or_default(),
        };

        Ok(Self {
            detection,
            camera,
            dashboard,
            font_path: file.render.and_then(|render| render.font_path),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("MONITOR_DETECT_URL") {
            if !url.trim().is_empty() {
                self.detection.url = url;
            }
        }
        if let Ok(url) = std::env::var("MONITOR_CHANNEL_BASE_URL") {
            if !url.trim().is_empty() {
                self.dashboard.base_url = url;
            }
        }
        if let Ok(fps) = std::env::var("MONITOR_POLL_FPS") {
            self.dashboard.fps_target = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("MONITOR_POLL_FPS must be an integer frame rate"))?;
        }
        if let Ok(backoff) = std::env::var("MONITOR_RETRY_BACKOFF_MS") {
            let millis: u64 = backoff.trim().parse().map_err(|_| {
                anyhow!("MONITOR_RETRY_BACKOFF_MS must be an integer number of milliseconds")
            })?;
            self.dashboard.retry_backoff = Duration::from_millis(millis);
        }
        if let Ok(channels) = std::env::var("MONITOR_CHANNELS") {
            let parsed = split_csv(&channels);
            if !parsed.is_empty() {
                self.dashboard.channels = parsed.into_iter().map(ChannelId::new).collect();
            }
        }
        if let Ok(path) = std::env::var("MONITOR_FONT_PATH") {
            if !path.trim().is_empty() {
                self.font_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        validate_url("detection.url", &self.detection.url, true)?;
        validate_url("dashboard.base_url", &self.dashboard.base_url, false)?;

        if self.dashboard.fps_target == 0 {
            bail!("dashboard fps_target must be greater than zero");
        }
        if self.dashboard.retry_backoff.is_zero() {
            bail!("dashboard retry backoff must be greater than zero");
        }
        if self.camera.target_fps == 0 {
            bail!("camera target_fps must be greater than zero");
        }

        let mut seen = HashSet::new();
        for device in &self.camera.devices {
            if device.device_id.trim().is_empty() {
                bail!("camera device ids must not be empty");
            }
            if !seen.insert(device.device_id.as_str()) {
                bail!("duplicate camera device id '{}'", device.device_id);
            }
        }

        let mut channels = HashSet::new();
        self.dashboard
            .channels
            .retain(|channel| channels.insert(channel.clone()));
        Ok(())
    }

    pub fn catalog(&self) -> DeviceCatalog {
        DeviceCatalog::new(self.camera.devices.clone())
    }

    pub fn detection_client(&self) -> DetectionClientConfig {
        DetectionClientConfig {
            url: self.detection.url.clone(),
            timeout: self.detection.timeout,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            target_fps: self.camera.target_fps,
            format: self.camera.format,
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            fps_target: self.dashboard.fps_target,
            retry_backoff: self.dashboard.retry_backoff,
        }
    }
}

fn default_devices() -> Vec<DeviceInfo> {
    vec![DeviceInfo {
        device_id: DEFAULT_DEVICE_ID.to_string(),
        label: "Synthetic camera".to_string(),
        kind: DeviceKind::VideoInput,
        url: DEFAULT_DEVICE_URL.to_string(),
        facing: None,
        width: None,
        height: None,
    }]
}

/// `stub://` is accepted where an in-process stand-in exists.
fn validate_url(field: &str, value: &str, allow_stub: bool) -> Result<()> {
    let parsed = url::Url::parse(value).map_err(|e| anyhow!("{} '{}': {}", field, value, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        "stub" if allow_stub => Ok(()),
        other => Err(anyhow!("{} '{}': unsupported scheme '{}'", field, value, other)),
    }
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
