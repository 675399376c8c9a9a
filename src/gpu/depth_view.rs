//! Debug overlay showing a captured depth texture.
//!
//! Draws a fullscreen triangle into a corner viewport of the surface,
//! mapping the capture to linear greyscale (near is white).

use super::capture::DepthTarget;
use crate::error::ShaderError;
use crate::registry::{Published, TargetId};
use crate::shaders;

/// Fraction of the surface the overlay covers on each axis.
const OVERLAY_FRACTION: f32 = 0.3;

pub struct DepthViewPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    bind_group: Option<(TargetId, wgpu::BindGroup)>,
}

impl DepthViewPass {
    pub fn new(
        device: &wgpu::Device,
        frame_layout: &wgpu::BindGroupLayout,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, ShaderError> {
        let shader = shaders::DEPTH_VIEW.create_module(device)?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Depth View Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Depth View Pipeline Layout"),
            bind_group_layouts: &[frame_layout, &layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Depth View Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(shaders::VERTEX_ENTRY),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(shaders::FRAGMENT_ENTRY),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            pipeline,
            layout,
            bind_group: None,
        })
    }

    /// Draw `published` into the bottom-right corner of `target`.
    ///
    /// With `clear` set the whole surface is cleared first, which wipes the
    /// frame the present pass just drew. The renderer passes its
    /// `auto_clear` flag, which is already off by the time it presents.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        surface_size: (u32, u32),
        frame_bind_group: &wgpu::BindGroup,
        published: &Published<DepthTarget>,
        clear: bool,
    ) {
        let stale = self.bind_group.as_ref().is_none_or(|(id, _)| *id != published.id);
        if stale {
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Depth View Bind Group"),
                layout: &self.layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&published.target.view),
                }],
            });
            self.bind_group = Some((published.id, bind_group));
        }
        let Some((_, bind_group)) = &self.bind_group else {
            return;
        };

        let load = overlay_load(clear);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Depth View Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let (width, height) = overlay_size(surface_size);
        pass.set_viewport(
            surface_size.0 as f32 - width,
            surface_size.1 as f32 - height,
            width,
            height,
            0.0,
            1.0,
        );
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, frame_bind_group, &[]);
        pass.set_bind_group(1, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn overlay_load(clear: bool) -> wgpu::LoadOp<wgpu::Color> {
    if clear {
        wgpu::LoadOp::Clear(wgpu::Color::BLACK)
    } else {
        wgpu::LoadOp::Load
    }
}

fn overlay_size((width, height): (u32, u32)) -> (f32, f32) {
    (
        (width as f32 * OVERLAY_FRACTION).floor().max(1.0),
        (height as f32 * OVERLAY_FRACTION).floor().max(1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_fits_surface() {
        let (w, h) = overlay_size((1280, 720));
        assert_eq!((w, h), (384.0, 216.0));

        let (w, h) = overlay_size((2, 2));
        assert_eq!((w, h), (1.0, 1.0));
    }

    #[test]
    fn test_overlay_composites_after_auto_clear_disabled() {
        assert!(matches!(overlay_load(false), wgpu::LoadOp::Load));
        assert!(matches!(overlay_load(true), wgpu::LoadOp::Clear(c) if c == wgpu::Color::BLACK));
    }
}
