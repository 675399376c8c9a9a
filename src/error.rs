//! Error types for smokefade.
//!
//! GPU setup, shader validation, sprite loading, configuration and frame
//! rendering each get their own error type. [`SceneError`] wraps the
//! startup failures and is what [`SmokeScene::run`](crate::SmokeScene::run)
//! hands back to the host.

use std::fmt;

use crate::registry::Channel;

/// Errors that can occur during GPU initialization.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("Failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    #[error("No compatible GPU adapter found ({0}). Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support.")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    /// Failed to create GPU device.
    #[error("Failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
}

/// Pipeline stage a shader error was attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    /// Whole-module failure (parse errors, bad globals).
    Module,
    /// The `vs_main` entry point.
    Vertex,
    /// The `fs_main` entry point.
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Module => write!(f, "module"),
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// A shader program failed validation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("shader program '{program}' failed in {stage} stage: {message}")]
pub struct ShaderError {
    /// Name of the failing program.
    pub program: &'static str,
    /// Stage the failure was attributed to.
    pub stage: ShaderStage,
    /// Validator output.
    pub message: String,
}

/// Errors that can occur during texture loading.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    /// Failed to decode image file.
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),
    /// Failed to read file from disk.
    #[error("Failed to read texture file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in a scene configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// Config file is not valid JSON for [`SceneConfig`](crate::config::SceneConfig).
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
    /// Per-volume capture needs one registry channel per volume.
    #[error("{count} smoke volumes requested but per-volume capture supports at most {max}")]
    TooManyVolumes { count: usize, max: usize },
}

/// Errors that abort a single frame.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The surface texture could not be acquired.
    #[error("Failed to acquire surface texture: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    /// A capture was requested on a channel with no target allocated.
    #[error("No capture target allocated for channel {0:?}")]
    MissingCaptureTarget(Channel),
}

/// Errors that can occur when running a scene.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Failed to create event loop.
    #[error("Failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    /// Failed to create window.
    #[error("Failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    /// GPU initialization failed.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    /// A shader program did not validate.
    #[error(transparent)]
    Shader(#[from] ShaderError),
    /// The scene configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
