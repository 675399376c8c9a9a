//! Scene builder and window loop.

use std::path::PathBuf;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::camera::Camera;
use crate::config::{CameraConfig, CaptureSharing, LogoConfig, SceneConfig, SmokeVolumeConfig};
use crate::error::{ConfigError, RenderError, SceneError};
use crate::gpu::Renderer;
use crate::orchestrator::FrameOrchestrator;
use crate::time::FrameClock;
use crate::volume::SmokeVolume;

/// A smoke compositing scene.
///
/// Starts from the reference scene (three volumes around a logo slab). Use
/// method chaining to adjust, then call [`run`](Self::run).
///
/// ```ignore
/// use smokefade::prelude::*;
///
/// SmokeScene::new()
///     .with_capture_sharing(CaptureSharing::PerVolume)
///     .with_seed(7)
///     .run()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct SmokeScene {
    config: SceneConfig,
}

impl SmokeScene {
    /// The reference scene.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: SceneConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Add a smoke volume.
    pub fn with_volume(mut self, volume: SmokeVolumeConfig) -> Self {
        self.config.volumes.push(volume);
        self
    }

    /// Replace every smoke volume.
    pub fn with_volumes(mut self, volumes: Vec<SmokeVolumeConfig>) -> Self {
        self.config.volumes = volumes;
        self
    }

    pub fn with_capture_sharing(mut self, sharing: CaptureSharing) -> Self {
        self.config.capture_sharing = sharing;
        self
    }

    /// Particles per volume is `size * size`.
    pub fn with_grid_size(mut self, size: u32) -> Self {
        self.config.grid_size = size;
        self
    }

    /// Per-frame Z rotation in radians.
    pub fn with_rotation_step(mut self, step: f32) -> Self {
        self.config.rotation_step = step;
        self
    }

    /// Fade band in view-space units.
    pub fn with_fade_range(mut self, start: f32, end: f32) -> Self {
        self.config.fade_range = Vec2::new(start, end);
        self
    }

    /// Fix the particle scatter.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.config.camera = camera;
        self
    }

    pub fn with_logo(mut self, logo: LogoConfig) -> Self {
        self.config.logo = logo;
        self
    }

    pub fn with_group_position(mut self, position: Vec3) -> Self {
        self.config.group_position = position;
        self
    }

    pub fn with_assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.assets_dir = dir.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.window.title = title.into();
        self
    }

    /// Scatter every volume and register its capture channel.
    pub fn prepare(&self) -> Result<(Vec<SmokeVolume>, FrameOrchestrator), ConfigError> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let volumes = SmokeVolume::from_scene(&self.config, &mut rng)?;

        let mut orchestrator = FrameOrchestrator::new();
        for volume in &volumes {
            if orchestrator.register_capture(volume.capture_channel()) {
                log::debug!("capture registered on {:?}", volume.capture_channel());
            }
        }
        log::info!(
            "{} smoke volume(s), {} particles each, {} capture(s)",
            volumes.len(),
            (self.config.grid_size as usize).pow(2),
            orchestrator.captures().len(),
        );

        Ok((volumes, orchestrator))
    }

    /// Open the window and run until it is closed.
    pub fn run(self) -> Result<(), SceneError> {
        let (volumes, orchestrator) = self.prepare()?;

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self.config, volumes, orchestrator);
        event_loop.run_app(&mut app)?;

        match app.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct App {
    config: SceneConfig,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    volumes: Vec<SmokeVolume>,
    orchestrator: FrameOrchestrator,
    camera: Camera,
    clock: FrameClock,
    mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
    /// Startup failure to hand back from `run`.
    error: Option<SceneError>,
}

impl App {
    fn new(config: SceneConfig, volumes: Vec<SmokeVolume>, orchestrator: FrameOrchestrator) -> Self {
        let CameraConfig { fov_degrees, near, far, .. } = config.camera;
        let distance = config.camera.distance_for_width(config.window.width);
        Self {
            camera: Camera::new(fov_degrees, near, far, distance),
            config,
            window: None,
            renderer: None,
            volumes,
            orchestrator,
            clock: FrameClock::new(),
            mouse_pressed: false,
            last_mouse_pos: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: SceneError) {
        log::error!("{error}");
        self.error = Some(error);
        event_loop.exit();
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        match event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
            PhysicalKey::Code(KeyCode::Space) => {
                self.clock.toggle_pause();
                log::info!("{}", if self.clock.is_paused() { "paused" } else { "resumed" });
            }
            PhysicalKey::Code(KeyCode::KeyD) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.toggle_depth_view();
                }
            }
            _ => {}
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = &mut self.renderer else {
            return;
        };

        let (elapsed, _) = self.clock.update();
        if !self.clock.is_paused() {
            for volume in &mut self.volumes {
                volume.tick();
            }
        }

        match renderer.render(&mut self.orchestrator, &mut self.volumes, &self.camera, elapsed) {
            Ok(info) => {
                if info.frame == 0 {
                    log::info!("first frame presented");
                }
            }
            Err(RenderError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                renderer.reconfigure();
            }
            Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                log::error!("out of GPU memory");
                event_loop.exit();
            }
            Err(e) => log::error!("render error: {e}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };
        self.window = Some(window.clone());

        match pollster::block_on(Renderer::new(window, &self.config, &self.volumes)) {
            Ok(renderer) => self.renderer = Some(renderer),
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(physical_size);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.mouse_pressed = state == ElementState::Pressed;
                    if !self.mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.mouse_pressed {
                    if let Some((last_x, last_y)) = self.last_mouse_pos {
                        let dx = position.x - last_x;
                        let dy = position.y - last_y;
                        self.camera.orbit(dx as f32, dy as f32);
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
                };
                self.camera.zoom(scroll);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Channel;
    use crate::textures::SmokeColor;

    #[test]
    fn test_builder_overrides() {
        let scene = SmokeScene::new()
            .with_grid_size(4)
            .with_rotation_step(0.05)
            .with_fade_range(0.1, 1.0)
            .with_seed(9)
            .with_title("demo");

        let config = scene.config();
        assert_eq!(config.grid_size, 4);
        assert_eq!(config.rotation_step, 0.05);
        assert_eq!(config.fade_range, Vec2::new(0.1, 1.0));
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.window.title, "demo");
    }

    #[test]
    fn test_prepare_shared_registers_one_capture() {
        let (volumes, orchestrator) = SmokeScene::new().with_seed(1).prepare().unwrap();
        assert_eq!(volumes.len(), 3);
        assert_eq!(orchestrator.captures(), &[Channel::Depth]);
    }

    #[test]
    fn test_prepare_per_volume_registers_each_channel() {
        let (_, orchestrator) = SmokeScene::new()
            .with_capture_sharing(CaptureSharing::PerVolume)
            .with_seed(1)
            .prepare()
            .unwrap();
        assert_eq!(orchestrator.captures(), &[Channel::Depth, Channel::G, Channel::B]);
    }

    #[test]
    fn test_prepare_is_deterministic_with_seed() {
        let (a, _) = SmokeScene::new().with_seed(42).prepare().unwrap();
        let (b, _) = SmokeScene::new().with_seed(42).prepare().unwrap();
        for (va, vb) in a.iter().zip(&b) {
            assert_eq!(va.field().instances(), vb.field().instances());
        }
    }

    #[test]
    fn test_prepare_rejects_too_many_per_volume() {
        let extra = SmokeVolumeConfig::new(SmokeColor::Red, 0.4, Vec3::ZERO);
        let result = SmokeScene::new()
            .with_capture_sharing(CaptureSharing::PerVolume)
            .with_volume(extra.clone())
            .with_volume(extra)
            .prepare();
        assert!(matches!(result, Err(ConfigError::TooManyVolumes { count: 5, max: 4 })));
    }

    #[test]
    fn test_prepare_rejects_oversized_grid() {
        let result = SmokeScene::new().with_grid_size(50_000).prepare();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_scene_has_no_captures() {
        let (volumes, orchestrator) = SmokeScene::new().with_volumes(Vec::new()).prepare().unwrap();
        assert!(volumes.is_empty());
        assert!(orchestrator.captures().is_empty());
    }
}
