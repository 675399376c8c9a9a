//! # smokefade
//!
//! Billboard smoke that fades softly where it meets opaque geometry.
//!
//! Each frame the opaque scene is first rendered into an off-screen depth
//! capture. Smoke billboards then sample that capture, reconstruct the
//! view-space depth of whatever lies behind them and fade out over a short
//! band as they approach it, instead of cutting a hard line through the
//! mesh.
//!
//! ## Quick Start
//!
//! ```ignore
//! use smokefade::prelude::*;
//!
//! fn main() -> Result<(), SceneError> {
//!     SmokeScene::new()
//!         .with_seed(7)
//!         .with_fade_range(0.0, 0.8)
//!         .run()
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Frames
//!
//! A [`FrameOrchestrator`] runs three stages per frame: capture depth on
//! every registered channel, turn off implicit surface clears, then clear
//! and present. The stages are executed by a [`FrameExecutor`]; the GPU
//! renderer is one, a test double is another.
//!
//! ### Depth captures
//!
//! Captures are published into a [`RenderTargetRegistry`] under one of four
//! [`Channel`]s. By default every smoke volume shares the [`Channel::Depth`]
//! capture; [`CaptureSharing::PerVolume`] gives each volume its own.
//!
//! ### Fade
//!
//! The per-fragment math lives in [`fade`] as plain functions, mirrored by
//! the WGSL in the `depth_fade` program:
//!
//! ```ignore
//! let fade = fade::fade_factor(particle_z, Some(scene_depth), near, far, range);
//! let alpha = fade::composite_alpha(sprite_alpha, fade);
//! ```
//!
//! ## Controls
//!
//! - **Left mouse drag**: orbit the camera
//! - **Scroll**: zoom
//! - **D**: toggle the depth capture overlay
//! - **Space**: pause
//! - **Esc**: quit

pub mod camera;
pub mod config;
pub mod error;
pub mod fade;
mod gpu;
pub mod mesh;
pub mod orchestrator;
pub mod particles;
pub mod registry;
mod scene;
pub mod shaders;
pub mod textures;
pub mod time;
pub mod uniforms;
pub mod volume;

pub use config::{CaptureSharing, SceneConfig, SmokeVolumeConfig};
pub use error::{ConfigError, GpuError, RenderError, SceneError, ShaderError, TextureError};
pub use glam::{Vec2, Vec3, Vec4};
pub use gpu::{DepthTarget, Renderer, TargetSize};
pub use orchestrator::{FrameExecutor, FrameInfo, FrameOrchestrator, FrameStage};
pub use registry::{Channel, RenderTargetRegistry, TargetId};
pub use scene::SmokeScene;
pub use textures::SmokeColor;
pub use volume::SmokeVolume;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use smokefade::prelude::*;
/// ```
pub mod prelude {
    pub use crate::camera::Camera;
    pub use crate::config::{CameraConfig, CaptureSharing, LogoConfig, SceneConfig, SmokeVolumeConfig};
    pub use crate::error::SceneError;
    pub use crate::fade;
    pub use crate::scene::SmokeScene;
    pub use crate::textures::SmokeColor;
    pub use crate::{Vec2, Vec3, Vec4};
}
