//! GPU side of a smoke volume.
//!
//! [`ParticlePipeline`] is shared by every volume. Each [`ParticleFieldGpu`]
//! owns its instance buffer, fade uniforms, sprite texture and a bind group
//! that points at whichever depth capture its channel currently publishes.

use glam::{Mat4, Vec2};
use wgpu::util::DeviceExt;

use super::capture::DepthTarget;
use super::DEPTH_FORMAT;
use crate::error::ShaderError;
use crate::registry::{Channel, Published, TargetId};
use crate::shaders;
use crate::textures::SpriteImage;
use crate::uniforms::{FadeUniforms, InstanceRaw};

/// Vertices per billboard quad.
const QUAD_VERTICES: u32 = 6;

/// Alpha-blended billboard pipeline with depth test and no depth writes.
pub struct ParticlePipeline {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl ParticlePipeline {
    pub fn new(
        device: &wgpu::Device,
        frame_layout: &wgpu::BindGroupLayout,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, ShaderError> {
        let shader = shaders::DEPTH_FADE.create_module(device)?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Smoke Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Smoke Sprite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Smoke Pipeline Layout"),
            bind_group_layouts: &[frame_layout, &layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Smoke Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(shaders::VERTEX_ENTRY),
                buffers: &[InstanceRaw::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(shaders::FRAGMENT_ENTRY),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            // Smoke is occluded by the present pass depth but never writes it
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            pipeline,
            layout,
            sampler,
        })
    }
}

/// Upload an RGBA8 sprite as an sRGB texture.
pub fn upload_sprite(device: &wgpu::Device, queue: &wgpu::Queue, sprite: &SpriteImage, label: &str) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: sprite.width,
        height: sprite.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &sprite.data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * sprite.width),
            rows_per_image: Some(sprite.height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Per-volume GPU resources.
pub struct ParticleFieldGpu {
    channel: Channel,
    placement: Mat4,
    fade_range: Vec2,
    instance_buffer: wgpu::Buffer,
    instance_count: u32,
    uniform_buffer: wgpu::Buffer,
    sprite: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    /// Capture the bind group currently samples; `None` means the placeholder.
    bound: Option<TargetId>,
}

impl ParticleFieldGpu {
    /// Create buffers sized for `matrices` and bind the placeholder depth.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &wgpu::Device,
        pipeline: &ParticlePipeline,
        channel: Channel,
        placement: Mat4,
        fade_range: Vec2,
        matrices: &[Mat4],
        sprite: wgpu::TextureView,
        placeholder_depth: &wgpu::TextureView,
    ) -> Self {
        let instances: Vec<InstanceRaw> = matrices.iter().map(InstanceRaw::from).collect();
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Smoke Instance Buffer"),
            contents: bytemuck::cast_slice(&instances),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fade Uniform Buffer"),
            contents: bytemuck::bytes_of(&FadeUniforms::new(placement, fade_range, false)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = create_bind_group(device, pipeline, &uniform_buffer, &sprite, placeholder_depth);

        Self {
            channel,
            placement,
            fade_range,
            instance_buffer,
            instance_count: matrices.len() as u32,
            uniform_buffer,
            sprite,
            bind_group,
            bound: None,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Copy updated instance transforms to the GPU.
    pub fn upload(&self, queue: &wgpu::Queue, matrices: &[Mat4]) {
        let instances: Vec<InstanceRaw> = matrices
            .iter()
            .take(self.instance_count as usize)
            .map(InstanceRaw::from)
            .collect();
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
    }

    /// Point the depth binding at `published`, or the placeholder if nothing
    /// has been published on this field's channel yet.
    ///
    /// Only rebuilds the bind group when the published target changed.
    /// Returns `true` if it did.
    pub fn sync_depth(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &ParticlePipeline,
        published: Option<&Published<DepthTarget>>,
        placeholder_depth: &wgpu::TextureView,
    ) -> bool {
        let Some(id) = depth_binding(self.bound, published.map(|p| p.id)) else {
            return false;
        };

        let depth_view = published.map(|p| &p.target.view).unwrap_or(placeholder_depth);
        self.bind_group = create_bind_group(device, pipeline, &self.uniform_buffer, &self.sprite, depth_view);
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&FadeUniforms::new(self.placement, self.fade_range, id.is_some())),
        );

        match id {
            Some(id) => log::debug!("smoke on {:?} now samples capture {}", self.channel, id),
            None => log::debug!("smoke on {:?} lost its capture", self.channel),
        }
        self.bound = id;
        true
    }

    /// Draw every billboard. Expects the frame bind group at group 0 to be
    /// set by the caller's pass.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, pipeline: &ParticlePipeline) {
        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(1, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
        pass.draw(0..QUAD_VERTICES, 0..self.instance_count);
    }
}

/// Binding a field must switch to, or `None` if `bound` is current.
///
/// Inner `None` is the placeholder. Any id change rebinds, including a
/// capture reallocated on resize.
fn depth_binding(bound: Option<TargetId>, published: Option<TargetId>) -> Option<Option<TargetId>> {
    (bound != published).then_some(published)
}

fn create_bind_group(
    device: &wgpu::Device,
    pipeline: &ParticlePipeline,
    uniform_buffer: &wgpu::Buffer,
    sprite: &wgpu::TextureView,
    depth: &wgpu::TextureView,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Smoke Bind Group"),
        layout: &pipeline.layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(sprite),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&pipeline.sampler),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(depth),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RenderTargetRegistry;

    /// Drive the binding the way `sync_depth` does, against a registry.
    fn follow(bound: &mut Option<TargetId>, registry: &RenderTargetRegistry<&str>) -> Option<FadeUniforms> {
        let next = depth_binding(*bound, registry.current_id(Channel::Depth))?;
        *bound = next;
        Some(FadeUniforms::new(Mat4::IDENTITY, Vec2::new(0.0, 0.8), next.is_some()))
    }

    #[test]
    fn test_unbound_field_keeps_placeholder() {
        assert_eq!(depth_binding(None, None), None);

        let registry = RenderTargetRegistry::<&str>::new();
        let mut bound = None;
        assert!(follow(&mut bound, &registry).is_none());
        assert_eq!(bound, None);
    }

    #[test]
    fn test_first_publish_binds_capture() {
        let mut registry = RenderTargetRegistry::new();
        let mut bound = None;
        registry.publish(Channel::Depth, TargetId(0), "800x600");

        let uniforms = follow(&mut bound, &registry).unwrap();
        assert_eq!(bound, Some(TargetId(0)));
        assert_eq!(uniforms.depth_available, 1);
    }

    #[test]
    fn test_republish_same_target_keeps_binding() {
        let mut registry = RenderTargetRegistry::new();
        let mut bound = None;
        registry.publish(Channel::Depth, TargetId(0), "800x600");
        follow(&mut bound, &registry).unwrap();

        for _ in 0..3 {
            registry.publish(Channel::Depth, TargetId(0), "800x600");
            assert!(follow(&mut bound, &registry).is_none());
        }
        assert_eq!(depth_binding(Some(TargetId(0)), Some(TargetId(0))), None);
    }

    #[test]
    fn test_resized_capture_rebinds() {
        let mut registry = RenderTargetRegistry::new();
        let mut bound = None;
        registry.publish(Channel::Depth, TargetId(0), "800x600");
        follow(&mut bound, &registry).unwrap();

        registry.publish(Channel::Depth, TargetId(1), "1600x1200");
        let uniforms = follow(&mut bound, &registry).unwrap();
        assert_eq!(bound, Some(TargetId(1)));
        assert_eq!(uniforms.depth_available, 1);
        assert_eq!(registry.get(Channel::Depth).unwrap().target, "1600x1200");
    }

    #[test]
    fn test_cleared_channel_falls_back_to_placeholder() {
        let mut registry = RenderTargetRegistry::new();
        let mut bound = None;
        registry.publish(Channel::Depth, TargetId(4), "800x600");
        follow(&mut bound, &registry).unwrap();

        registry.clear(Channel::Depth);
        let uniforms = follow(&mut bound, &registry).unwrap();
        assert_eq!(bound, None);
        assert_eq!(uniforms.depth_available, 0);
        assert_eq!(depth_binding(Some(TargetId(4)), None), Some(None));
    }
}
