//! Capture constraints and the catalog of configured video inputs.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AcquisitionError;

/// Acceptable span for one capture dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Range {
    pub min: u32,
    pub ideal: u32,
    pub max: u32,
}

impl Range {
    pub const fn new(min: u32, ideal: u32, max: u32) -> Self {
        Self { min, ideal, max }
    }

    /// Pick the capture size for a device. A device with a fixed native size
    /// must fall inside `min..=max`; otherwise `ideal` is used.
    pub fn resolve(&self, native: Option<u32>) -> Option<u32> {
        match native {
            Some(size) if size < self.min || size > self.max => None,
            Some(size) => Some(size),
            None => Some(self.ideal.clamp(self.min, self.max)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

impl FromStr for FacingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "user" | "front" => Ok(FacingMode::User),
            "environment" | "rear" | "back" => Ok(FacingMode::Environment),
            other => Err(format!(
                "unknown facing mode '{}'; expected user or environment",
                other
            )),
        }
    }
}

/// Capture request. `facing_mode` and `device_id` are exact matches when set.
///
/// Fields missing from a config file take their `Default` values.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Constraints {
    pub width: Range,
    pub height: Range,
    pub facing_mode: Option<FacingMode>,
    pub device_id: Option<String>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            width: Range::new(1280, 1920, 2560),
            height: Range::new(720, 1080, 1440),
            facing_mode: None,
            device_id: None,
        }
    }
}

impl Constraints {
    pub fn with_facing_mode(mut self, facing_mode: Option<FacingMode>) -> Self {
        self.facing_mode = facing_mode;
        self
    }

    pub fn with_device_id(mut self, device_id: Option<String>) -> Self {
        self.device_id = device_id;
        self
    }
}

/// Camera facing selector exposed to the controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacingPreset {
    /// Any facing; the selected device decides.
    Default,
    Front,
    Rear,
}

impl FacingPreset {
    /// Derive constraints from `base`, keeping its device selection.
    pub fn apply(self, base: &Constraints) -> Constraints {
        let facing_mode = match self {
            FacingPreset::Default => None,
            FacingPreset::Front => Some(FacingMode::User),
            FacingPreset::Rear => Some(FacingMode::Environment),
        };
        base.clone().with_facing_mode(facing_mode)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    VideoInput,
    AudioInput,
}

/// A capture device known to the client.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceInfo {
    pub device_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub kind: DeviceKind,
    pub url: String,
    #[serde(default)]
    pub facing: Option<FacingMode>,
    /// Fixed native width, when the device cannot scale.
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Device plus the capture size chosen for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedDevice {
    pub device: DeviceInfo,
    pub width: u32,
    pub height: u32,
}

/// Devices available to the camera pipeline.
#[derive(Clone, Debug, Default)]
pub struct DeviceCatalog {
    devices: Vec<DeviceInfo>,
}

impl DeviceCatalog {
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self { devices }
    }

    /// Video inputs in catalog order (what a device menu lists).
    pub fn enumerate_video_inputs(&self) -> Vec<&DeviceInfo> {
        self.devices
            .iter()
            .filter(|device| device.kind == DeviceKind::VideoInput)
            .collect()
    }

    /// First video input satisfying every constraint.
    pub fn resolve(&self, constraints: &Constraints) -> Result<ResolvedDevice, AcquisitionError> {
        for device in self.enumerate_video_inputs() {
            if let Some(wanted) = constraints.device_id.as_deref() {
                if device.device_id != wanted {
                    continue;
                }
            }
            if let Some(wanted) = constraints.facing_mode {
                if device.facing != Some(wanted) {
                    continue;
                }
            }
            let width = constraints.width.resolve(device.width);
            let height = constraints.height.resolve(device.height);
            if let (Some(width), Some(height)) = (width, height) {
                return Ok(ResolvedDevice {
                    device: device.clone(),
                    width,
                    height,
                });
            }
        }
        Err(AcquisitionError::Overconstrained(describe(constraints)))
    }
}

fn describe(constraints: &Constraints) -> String {
    let mut parts = vec![format!(
        "width {}..{}, height {}..{}",
        constraints.width.min, constraints.width.max, constraints.height.min, constraints.height.max
    )];
    if let Some(facing) = constraints.facing_mode {
        parts.push(format!("facing {:?}", facing));
    }
    if let Some(device_id) = &constraints.device_id {
        parts.push(format!("device '{}'", device_id));
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_constraints_fill_in_defaults() {
        let parsed: Constraints = serde_json::from_str(r#"{"facing_mode": "user"}"#).unwrap();
        assert_eq!(parsed.facing_mode, Some(FacingMode::User));
        assert_eq!(parsed.width, Constraints::default().width);
        assert_eq!(parsed.height, Range::new(720, 1080, 1440));
        assert_eq!(parsed.device_id, None);
    }

    fn device(id: &str, facing: Option<FacingMode>) -> DeviceInfo {
        DeviceInfo {
            device_id: id.to_string(),
            label: id.to_uppercase(),
            kind: DeviceKind::VideoInput,
            url: format!("stub://{}", id),
            facing,
            width: None,
            height: None,
        }
    }

    fn catalog() -> DeviceCatalog {
        let mut mic = device("mic", None);
        mic.kind = DeviceKind::AudioInput;
        DeviceCatalog::new(vec![
            mic,
            device("front", Some(FacingMode::User)),
            device("rear", Some(FacingMode::Environment)),
        ])
    }

    #[test]
    fn enumerate_skips_non_video_inputs() {
        let catalog = catalog();
        let ids: Vec<&str> = catalog
            .enumerate_video_inputs()
            .iter()
            .map(|device| device.device_id.as_str())
            .collect();
        assert_eq!(ids, vec!["front", "rear"]);
    }

    #[test]
    fn resolves_by_facing_mode_and_ideal_size() {
        let constraints = FacingPreset::Rear.apply(&Constraints::default());
        let resolved = catalog().resolve(&constraints).unwrap();
        assert_eq!(resolved.device.device_id, "rear");
        assert_eq!((resolved.width, resolved.height), (1920, 1080));
    }

    #[test]
    fn exact_device_id_must_match() {
        let constraints = Constraints::default().with_device_id(Some("missing".to_string()));
        assert!(matches!(
            catalog().resolve(&constraints),
            Err(AcquisitionError::Overconstrained(_))
        ));
    }

    #[test]
    fn native_size_outside_range_is_overconstrained() {
        let mut small = device("small", None);
        small.width = Some(640);
        small.height = Some(480);
        let catalog = DeviceCatalog::new(vec![small]);
        assert!(catalog.resolve(&Constraints::default()).is_err());
    }

    #[test]
    fn facing_mode_parses_aliases() {
        assert_eq!("front".parse::<FacingMode>(), Ok(FacingMode::User));
        assert_eq!("environment".parse::<FacingMode>(), Ok(FacingMode::Environment));
        assert!("sideways".parse::<FacingMode>().is_err());
    }
}
