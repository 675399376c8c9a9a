//! GPU state and the per-frame render passes.
//!
//! [`Renderer`] owns the device, the surface and every pipeline. A frame is
//! driven by a [`FrameOrchestrator`]: [`Renderer::render`] acquires the
//! surface texture, hands a [`FrameExecutor`] over the command encoder to
//! the orchestrator, then submits and presents.
//!
//! Depth captures are published into a [`RenderTargetRegistry`] owned by the
//! renderer. Particle fields look their channel up at present time and
//! rebind only when the published target changes.

mod capture;
mod depth_view;
mod opaque;
mod particles;

pub use capture::{CaptureTarget, DepthTarget, TargetSize};

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, Quat, Vec2, Vec3};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::camera::Camera;
use crate::config::SceneConfig;
use crate::error::{GpuError, RenderError, SceneError};
use crate::mesh::MeshData;
use crate::orchestrator::{FrameExecutor, FrameInfo, FrameOrchestrator};
use crate::registry::{Channel, RenderTargetRegistry, TargetId};
use crate::textures::SpriteImage;
use crate::uniforms::FrameUniforms;
use crate::volume::SmokeVolume;

use depth_view::DepthViewPass;
use opaque::{OpaqueRenderer, OpaqueTarget};
use particles::{upload_sprite, ParticleFieldGpu, ParticlePipeline};

/// Depth buffer format for the present pass.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Depth format of capture targets. 16-bit unsigned normalized.
pub const CAPTURE_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth16Unorm;
/// Color format of capture targets. The color output is never sampled.
pub const CAPTURE_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_texture: wgpu::TextureView,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    opaque: OpaqueRenderer,
    particles: ParticlePipeline,
    fields: Vec<ParticleFieldGpu>,
    depth_view: DepthViewPass,
    /// Bound in place of a capture until one is published.
    placeholder_depth: wgpu::TextureView,
    captures: [Option<CaptureTarget>; 4],
    registry: RenderTargetRegistry<DepthTarget>,
    next_target_id: u64,
    background: wgpu::Color,
    auto_clear: bool,
    show_depth_view: bool,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, scene: &SceneConfig, volumes: &[SmokeVolume]) -> Result<Self, SceneError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window).map_err(GpuError::from)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(GpuError::from)?;

        let info = adapter.get_info();
        log::info!("using adapter '{}' ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await
            .map_err(GpuError::from)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture = create_depth_texture(&device, &config);

        // Frame uniforms: one buffer shared by captures and the present pass
        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Uniform Buffer"),
            contents: bytemuck::bytes_of(&FrameUniforms::new(
                Mat4::IDENTITY,
                Mat4::IDENTITY,
                Vec2::new(config.width as f32, config.height as f32),
                scene.camera.near,
                scene.camera.far,
                0.0,
            )),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let mut opaque = OpaqueRenderer::new(&device, &frame_layout, surface_format)?;
        let logo = &scene.logo;
        let logo_model = Mat4::from_scale_rotation_translation(
            Vec3::splat(logo.scale),
            Quat::from_rotation_y(logo.rotation_y),
            logo.position,
        );
        opaque.add_mesh(&device, &MeshData::logo(), logo_model, logo.color.extend(1.0));

        let particles = ParticlePipeline::new(&device, &frame_layout, surface_format)?;
        let depth_view = DepthViewPass::new(&device, &frame_layout, surface_format)?;
        let placeholder_depth = create_placeholder_depth(&device);

        let mut sprites = HashMap::new();
        let fields = volumes
            .iter()
            .map(|volume| {
                let color = volume.smoke_color();
                let sprite = sprites
                    .entry(color)
                    .or_insert_with(|| {
                        let image = SpriteImage::load_or_generate(&scene.assets_dir, color);
                        upload_sprite(&device, &queue, &image, color.name())
                    })
                    .clone();
                ParticleFieldGpu::new(
                    &device,
                    &particles,
                    volume.capture_channel(),
                    volume.placement(),
                    scene.fade_range,
                    volume.field().matrices(),
                    sprite,
                    &placeholder_depth,
                )
            })
            .collect::<Vec<_>>();

        let mut renderer = Self {
            surface,
            device,
            queue,
            config,
            depth_texture,
            frame_buffer,
            frame_bind_group,
            opaque,
            particles,
            fields,
            depth_view,
            placeholder_depth,
            captures: std::array::from_fn(|_| None),
            registry: RenderTargetRegistry::new(),
            next_target_id: 0,
            background: wgpu::Color {
                r: scene.background.x as f64,
                g: scene.background.y as f64,
                b: scene.background.z as f64,
                a: 1.0,
            },
            auto_clear: true,
            show_depth_view: false,
        };

        for volume in volumes {
            renderer.allocate_capture(volume.capture_channel());
        }

        log::info!(
            "renderer ready: {} smoke volume(s), {} capture target(s), {} opaque mesh(es)",
            renderer.fields.len(),
            renderer.captures.iter().flatten().count(),
            renderer.opaque.mesh_count(),
        );

        Ok(renderer)
    }

    /// Ensure `channel` has a capture target sized to the surface.
    pub fn allocate_capture(&mut self, channel: Channel) {
        if self.captures[channel.index()].is_some() {
            return;
        }
        let id = self.next_id();
        self.captures[channel.index()] = Some(CaptureTarget::new(&self.device, id, self.size()));
    }

    fn next_id(&mut self) -> TargetId {
        let id = TargetId(self.next_target_id);
        self.next_target_id += 1;
        id
    }

    pub fn size(&self) -> TargetSize {
        TargetSize::new(self.config.width, self.config.height)
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    pub fn registry(&self) -> &RenderTargetRegistry<DepthTarget> {
        &self.registry
    }

    /// Whether overlays still clear the surface. Set at the start of every
    /// frame and cleared by the frame's disable-auto-clear stage.
    pub fn auto_clear(&self) -> bool {
        self.auto_clear
    }

    pub fn show_depth_view(&self) -> bool {
        self.show_depth_view
    }

    pub fn toggle_depth_view(&mut self) {
        self.show_depth_view = !self.show_depth_view;
        log::info!("depth view {}", if self.show_depth_view { "on" } else { "off" });
    }

    /// Reconfigure the surface and reallocate every capture target.
    ///
    /// Particle fields notice the new target ids on the next present and
    /// rebind.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = create_depth_texture(&self.device, &self.config);
            log::info!("resized to {}x{}", new_size.width, new_size.height);

            let viewport = self.size();
            let device = &self.device;
            let next_target_id = &mut self.next_target_id;
            for capture in self.captures.iter_mut().flatten() {
                let resized = capture.ensure_size(device, viewport, || {
                    let id = TargetId(*next_target_id);
                    *next_target_id += 1;
                    id
                });
                if resized {
                    let size = capture.size();
                    log::debug!("capture reallocated as {} at {}x{}", capture.id(), size.width, size.height);
                }
            }
        }
    }

    /// Reconfigure at the current size after the surface was lost.
    pub fn reconfigure(&mut self) {
        self.resize(winit::dpi::PhysicalSize::new(self.config.width, self.config.height));
    }

    fn update_frame_uniforms(&mut self, camera: &Camera, elapsed: f32) {
        let uniforms = FrameUniforms::new(
            camera.view_matrix(),
            camera.projection_matrix(self.aspect()),
            Vec2::new(self.config.width as f32, self.config.height as f32),
            camera.near,
            camera.far,
            elapsed,
        );
        self.queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Upload changed particle transforms, then run one orchestrated frame.
    ///
    /// `volumes` must be the slice the renderer was created with.
    pub fn render(
        &mut self,
        orchestrator: &mut FrameOrchestrator,
        volumes: &mut [SmokeVolume],
        camera: &Camera,
        elapsed: f32,
    ) -> Result<FrameInfo, RenderError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.update_frame_uniforms(camera, elapsed);
        // Re-armed every frame; the orchestrator disables it before present
        self.auto_clear = true;

        for (gpu, volume) in self.fields.iter().zip(volumes.iter_mut()) {
            if let Some(matrices) = volume.field_mut().take_upload() {
                gpu.upload(&self.queue, matrices);
            }
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let info = {
            let mut passes = FramePasses {
                renderer: self,
                encoder: &mut encoder,
                target: &view,
            };
            orchestrator.run_frame(&mut passes, elapsed)?
        };

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(info)
    }
}

/// Encodes the stages of one frame.
struct FramePasses<'a> {
    renderer: &'a mut Renderer,
    encoder: &'a mut wgpu::CommandEncoder,
    target: &'a wgpu::TextureView,
}

impl FrameExecutor for FramePasses<'_> {
    type Error = RenderError;

    fn capture_depth(&mut self, channel: Channel, _frame: &FrameInfo) -> Result<(), RenderError> {
        let r = &mut *self.renderer;
        let capture = r.captures[channel.index()]
            .as_ref()
            .ok_or(RenderError::MissingCaptureTarget(channel))?;

        capture.record(self.encoder, &r.opaque, &r.frame_bind_group);

        if r.registry.publish(channel, capture.id(), capture.depth_target()) {
            log::debug!("published capture {} on {:?}", capture.id(), channel);
        }
        Ok(())
    }

    fn disable_auto_clear(&mut self, _frame: &FrameInfo) -> Result<(), RenderError> {
        self.renderer.auto_clear = false;
        Ok(())
    }

    fn present(&mut self, _frame: &FrameInfo) -> Result<(), RenderError> {
        let r = &mut *self.renderer;

        for field in &mut r.fields {
            field.sync_depth(
                &r.device,
                &r.queue,
                &r.particles,
                r.registry.get(field.channel()),
                &r.placeholder_depth,
            );
        }

        {
            let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.target,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(r.background),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &r.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            r.opaque.draw(&mut pass, OpaqueTarget::Present, &r.frame_bind_group);
            for field in &r.fields {
                field.draw(&mut pass, &r.particles);
            }
        }

        if r.show_depth_view {
            if let Some(published) = r.registry.get(Channel::Depth) {
                r.depth_view.draw(
                    &r.device,
                    self.encoder,
                    self.target,
                    (r.config.width, r.config.height),
                    &r.frame_bind_group,
                    published,
                    r.auto_clear,
                );
            }
        }

        Ok(())
    }
}

fn create_depth_texture(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// 1x1 depth texture in the capture format. Its contents are never read:
/// fields bound to it have `depth_available` cleared.
fn create_placeholder_depth(device: &wgpu::Device) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Placeholder Depth Texture"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: CAPTURE_DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
