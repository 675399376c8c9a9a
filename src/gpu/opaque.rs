//! Opaque scene geometry and its two pipelines.
//!
//! The same meshes are drawn twice per frame: once into the depth capture
//! target and once to the surface. The pipelines differ only in their
//! attachment formats.

use glam::{Mat4, Vec4};
use wgpu::util::DeviceExt;

use super::{CAPTURE_COLOR_FORMAT, CAPTURE_DEPTH_FORMAT, DEPTH_FORMAT};
use crate::error::ShaderError;
use crate::mesh::{MeshData, MeshVertex};
use crate::shaders;
use crate::uniforms::MeshUniforms;

/// Which attachment set a draw targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueTarget {
    Capture,
    Present,
}

/// A mesh uploaded to the GPU with its own transform.
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    #[allow(dead_code)]
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Draws every opaque mesh in the scene.
pub struct OpaqueRenderer {
    capture_pipeline: wgpu::RenderPipeline,
    present_pipeline: wgpu::RenderPipeline,
    mesh_layout: wgpu::BindGroupLayout,
    meshes: Vec<GpuMesh>,
}

impl OpaqueRenderer {
    pub fn new(
        device: &wgpu::Device,
        frame_layout: &wgpu::BindGroupLayout,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, ShaderError> {
        let shader = shaders::OPAQUE.create_module(device)?;

        let mesh_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh Bind Group Layout"),
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

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Opaque Pipeline Layout"),
            bind_group_layouts: &[frame_layout, &mesh_layout],
            push_constant_ranges: &[],
        });

        let capture_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            &shader,
            "Opaque Capture Pipeline",
            CAPTURE_COLOR_FORMAT,
            CAPTURE_DEPTH_FORMAT,
        );
        let present_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            &shader,
            "Opaque Present Pipeline",
            surface_format,
            DEPTH_FORMAT,
        );

        Ok(Self {
            capture_pipeline,
            present_pipeline,
            mesh_layout,
            meshes: Vec::new(),
        })
    }

    /// Upload a mesh with a fixed transform and color.
    pub fn add_mesh(&mut self, device: &wgpu::Device, mesh: &MeshData, model: Mat4, color: Vec4) {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Uniform Buffer"),
            contents: bytemuck::bytes_of(&MeshUniforms::new(model, color)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh Bind Group"),
            layout: &self.mesh_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        self.meshes.push(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            uniform_buffer,
            bind_group,
        });
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Draw every mesh into an already-begun pass.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, target: OpaqueTarget, frame_bind_group: &wgpu::BindGroup) {
        let pipeline = match target {
            OpaqueTarget::Capture => &self.capture_pipeline,
            OpaqueTarget::Present => &self.present_pipeline,
        };
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, frame_bind_group, &[]);

        for mesh in &self.meshes {
            pass.set_bind_group(1, &mesh.bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    label: &str,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(shaders::VERTEX_ENTRY),
            buffers: &[MeshVertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(shaders::FRAGMENT_ENTRY),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
