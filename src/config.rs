//! Scene configuration.
//!
//! Everything a scene needs is described by [`SceneConfig`]. It can be built
//! in code (usually through [`SmokeScene`](crate::SmokeScene)) or loaded
//! from JSON, where every field is optional:
//!
//! ```json
//! {
//!   "grid_size": 12,
//!   "capture_sharing": "per_volume",
//!   "volumes": [
//!     { "smoke_color": "bluesmoke", "scale": 0.5, "position": [0, 0, 0] }
//!   ]
//! }
//! ```
//!
//! The defaults reproduce the reference scene: a logo slab crossed by three
//! smoke volumes (red, blue, green) around a shared anchor.

use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fade::DEFAULT_FADE_RANGE;
use crate::particles::{FieldConfig, DEFAULT_GRID_SIZE, DEFAULT_ROTATION_STEP};
use crate::registry::Channel;
use crate::textures::SmokeColor;
use crate::uniforms::InstanceRaw;

/// Window size below which the camera backs off to fit the scene.
const NARROW_WINDOW_WIDTH: u32 = 600;

/// How smoke volumes obtain their depth texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSharing {
    /// One capture per frame on [`Channel::Depth`], read by every volume.
    #[default]
    Shared,
    /// Each volume captures into its own channel (at most four volumes).
    PerVolume,
}

/// Window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "smokefade".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Camera settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Orbit distance. `None` picks 10, or 20 for narrow windows.
    pub distance: Option<f32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 0.1,
            far: 200.0,
            distance: None,
        }
    }
}

impl CameraConfig {
    /// Orbit distance for a window of the given width.
    pub fn distance_for_width(&self, width: u32) -> f32 {
        self.distance
            .unwrap_or(if width < NARROW_WINDOW_WIDTH { 20.0 } else { 10.0 })
    }
}

/// The opaque logo slab.
///
/// Its default front face sits inside the depth band of the default smoke
/// volumes, so part of the smoke fades against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoConfig {
    pub position: Vec3,
    pub scale: f32,
    /// Rotation around Y, in radians.
    pub rotation_y: f32,
    /// Linear RGB.
    pub color: Vec3,
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, -0.6),
            scale: 1.0,
            rotation_y: 0.0,
            color: Vec3::new(0.85, 0.82, 0.78),
        }
    }
}

/// One smoke volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmokeVolumeConfig {
    pub smoke_color: SmokeColor,
    #[serde(default = "default_volume_scale")]
    pub scale: f32,
    #[serde(default)]
    pub position: Vec3,
}

fn default_volume_scale() -> f32 {
    1.0
}

impl SmokeVolumeConfig {
    pub fn new(smoke_color: SmokeColor, scale: f32, position: Vec3) -> Self {
        Self {
            smoke_color,
            scale,
            position,
        }
    }
}

/// Full scene description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    /// Clear color, linear RGB.
    pub background: Vec3,
    /// Directory holding `<smoke_color>.png` sprites.
    pub assets_dir: PathBuf,
    /// RNG seed for particle scatter; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Particle grid edge length per volume.
    pub grid_size: u32,
    /// Z rotation added to each particle per frame, in radians.
    pub rotation_step: f32,
    /// Fade band `[start, end]` in view-space units.
    pub fade_range: Vec2,
    pub capture_sharing: CaptureSharing,
    /// Anchor all volumes are positioned relative to.
    pub group_position: Vec3,
    pub volumes: Vec<SmokeVolumeConfig>,
    pub logo: LogoConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            background: Vec3::ZERO,
            assets_dir: PathBuf::from("assets"),
            seed: None,
            grid_size: DEFAULT_GRID_SIZE,
            rotation_step: DEFAULT_ROTATION_STEP,
            fade_range: DEFAULT_FADE_RANGE,
            capture_sharing: CaptureSharing::Shared,
            group_position: Vec3::new(0.5, 1.0, -0.5),
            volumes: vec![
                SmokeVolumeConfig::new(SmokeColor::Red, 0.4, Vec3::new(-2.0, 0.0, 0.0)),
                SmokeVolumeConfig::new(SmokeColor::Blue, 0.4, Vec3::new(1.0, 0.0, 0.0)),
                SmokeVolumeConfig::new(SmokeColor::Green, 0.4, Vec3::new(0.0, -2.0, 0.0)),
            ],
            logo: LogoConfig::default(),
        }
    }
}

impl SceneConfig {
    /// Read and validate a JSON config file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON config.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: SceneConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the renderer can't honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size == 0 {
            return Err(ConfigError::Invalid("grid_size must be at least 1".into()));
        }
        let max_instances = max_instances_per_field();
        if u64::from(self.grid_size).pow(2) > max_instances {
            return Err(ConfigError::Invalid(format!(
                "grid_size {} needs {} instances per volume, the instance buffer holds at most {max_instances}",
                self.grid_size,
                u64::from(self.grid_size).pow(2),
            )));
        }
        let CameraConfig { near, far, fov_degrees, .. } = self.camera;
        if !(near > 0.0 && near < far) {
            return Err(ConfigError::Invalid(format!(
                "camera planes must satisfy 0 < near < far (near = {near}, far = {far})"
            )));
        }
        if !(fov_degrees > 0.0 && fov_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!("fov_degrees out of range: {fov_degrees}")));
        }
        if self.fade_range.x >= self.fade_range.y {
            return Err(ConfigError::Invalid(format!(
                "fade_range start must be below end ({} >= {})",
                self.fade_range.x, self.fade_range.y
            )));
        }
        if self.volumes.iter().any(|v| v.scale <= 0.0) {
            return Err(ConfigError::Invalid("smoke volume scale must be positive".into()));
        }
        if self.capture_sharing == CaptureSharing::PerVolume && self.volumes.len() > Channel::ALL.len() {
            return Err(ConfigError::TooManyVolumes {
                count: self.volumes.len(),
                max: Channel::ALL.len(),
            });
        }
        Ok(())
    }

    /// Particle field settings shared by every volume.
    pub fn field_config(&self) -> FieldConfig {
        FieldConfig {
            grid_size: self.grid_size,
            rotation_step: self.rotation_step,
        }
    }

    /// Capture channel for the volume at `index`.
    pub fn channel_for(&self, index: usize) -> Option<Channel> {
        match self.capture_sharing {
            CaptureSharing::Shared => Some(Channel::Depth),
            CaptureSharing::PerVolume => Channel::from_index(index),
        }
    }
}

/// Largest instance count a field's buffer can hold under default limits.
pub fn max_instances_per_field() -> u64 {
    wgpu::Limits::default().max_buffer_size / std::mem::size_of::<InstanceRaw>() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_reference_scene() {
        let config = SceneConfig::default();
        config.validate().unwrap();

        assert_eq!(config.grid_size, 10);
        assert_eq!(config.rotation_step, 0.01);
        assert_eq!(config.fade_range, Vec2::new(0.0, 0.8));
        assert_eq!(config.camera.near, 0.1);
        assert_eq!(config.camera.far, 200.0);
        assert_eq!(config.capture_sharing, CaptureSharing::Shared);

        let colors: Vec<SmokeColor> = config.volumes.iter().map(|v| v.smoke_color).collect();
        assert_eq!(colors, vec![SmokeColor::Red, SmokeColor::Blue, SmokeColor::Green]);
        assert!(config.volumes.iter().all(|v| v.scale == 0.4));
    }

    #[test]
    fn test_camera_distance_for_narrow_window() {
        let camera = CameraConfig::default();
        assert_eq!(camera.distance_for_width(1280), 10.0);
        assert_eq!(camera.distance_for_width(400), 20.0);

        let fixed = CameraConfig {
            distance: Some(7.0),
            ..Default::default()
        };
        assert_eq!(fixed.distance_for_width(400), 7.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SceneConfig::from_json(r#"{ "grid_size": 4 }"#).unwrap();
        assert_eq!(config.grid_size, 4);
        assert_eq!(config.volumes.len(), 3);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn test_json_volumes() {
        let config = SceneConfig::from_json(
            r#"{
                "capture_sharing": "per_volume",
                "volumes": [
                    { "smoke_color": "greensmoke", "position": [1, 2, 3] },
                    { "smoke_color": "redsmoke", "scale": 0.25 }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.volumes[0].smoke_color, SmokeColor::Green);
        assert_eq!(config.volumes[0].scale, 1.0);
        assert_eq!(config.volumes[0].position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(config.volumes[1].position, Vec3::ZERO);
        assert_eq!(config.channel_for(0), Some(Channel::Depth));
        assert_eq!(config.channel_for(1), Some(Channel::G));
    }

    #[test]
    fn test_round_trip() {
        let config = SceneConfig {
            seed: Some(99),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(SceneConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            SceneConfig::from_json(r#"{ "grid_size": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SceneConfig::from_json(r#"{ "camera": { "near": 5.0, "far": 1.0 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SceneConfig::from_json(r#"{ "fade_range": [0.8, 0.0] }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SceneConfig::from_json(r#"{ "grid_size": 50000 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SceneConfig::from_json(r#"{ "grid_size": 4294967295 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SceneConfig::from_json(r#"{ "grid_size": "ten" }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_grid_size_limit() {
        // 256 MiB default buffer limit over 64-byte instances
        assert_eq!(max_instances_per_field(), 4_194_304);

        let mut config = SceneConfig {
            grid_size: 2048,
            ..Default::default()
        };
        config.validate().unwrap();

        config.grid_size = 2049;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_per_volume_channel_limit() {
        let mut config = SceneConfig {
            capture_sharing: CaptureSharing::PerVolume,
            ..Default::default()
        };
        config.volumes = vec![SmokeVolumeConfig::new(SmokeColor::Red, 1.0, Vec3::ZERO); 5];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyVolumes { count: 5, max: 4 })
        ));

        config.capture_sharing = CaptureSharing::Shared;
        config.validate().unwrap();
        assert_eq!(config.channel_for(4), Some(Channel::Depth));
    }
}
