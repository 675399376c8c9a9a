//! Off-screen depth capture.
//!
//! A [`CaptureTarget`] is a color + depth pair sized to the surface. Each
//! frame the opaque scene is rendered into it, and its depth attachment is
//! published to the registry for particle fields to sample. The target is
//! reallocated (with a fresh [`TargetId`]) whenever the viewport changes
//! size, so the depth texels always line up with screen pixels.

use super::opaque::{OpaqueRenderer, OpaqueTarget};
use super::{CAPTURE_COLOR_FORMAT, CAPTURE_DEPTH_FORMAT};
use crate::registry::TargetId;

/// Pixel size of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zero-area sizes happen while a window is minimized.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether a target of this size must be reallocated for `viewport`.
    ///
    /// Empty viewports never trigger reallocation; the old target is kept
    /// until the window comes back.
    pub fn needs_realloc(&self, viewport: TargetSize) -> bool {
        !viewport.is_empty() && *self != viewport
    }
}

/// Read-only handle to a capture's depth attachment, as published in the
/// registry.
#[derive(Debug, Clone)]
pub struct DepthTarget {
    pub view: wgpu::TextureView,
    pub size: TargetSize,
}

/// Color + depth render target for the depth pre-pass.
pub struct CaptureTarget {
    id: TargetId,
    size: TargetSize,
    #[allow(dead_code)]
    color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    #[allow(dead_code)]
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

impl CaptureTarget {
    pub fn new(device: &wgpu::Device, id: TargetId, size: TargetSize) -> Self {
        let extent = wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        };

        let color_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Capture Color Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CAPTURE_COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Capture Depth Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CAPTURE_DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

        log::debug!("allocated capture {} at {}x{}", id, size.width, size.height);

        Self {
            id,
            size,
            color_texture,
            color_view,
            depth_texture,
            depth_view,
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn size(&self) -> TargetSize {
        self.size
    }

    /// Reallocate if `viewport` differs from the current size.
    ///
    /// Returns `true` if a new target (with id `new_id()`) was created.
    pub fn ensure_size(
        &mut self,
        device: &wgpu::Device,
        viewport: TargetSize,
        new_id: impl FnOnce() -> TargetId,
    ) -> bool {
        if !self.size.needs_realloc(viewport) {
            return false;
        }
        *self = Self::new(device, new_id(), viewport);
        true
    }

    /// Handle for the registry.
    pub fn depth_target(&self) -> DepthTarget {
        DepthTarget {
            view: self.depth_view.clone(),
            size: self.size,
        }
    }

    /// Record the capture pass: clear, then draw the opaque scene.
    ///
    /// Depth is cleared every frame so a capture never carries geometry
    /// from an earlier camera position.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        opaque: &OpaqueRenderer,
        frame_bind_group: &wgpu::BindGroup,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Depth Capture Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.color_view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        opaque.draw(&mut pass, OpaqueTarget::Capture, frame_bind_group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_requires_realloc() {
        let target = TargetSize::new(800, 600);
        assert!(target.needs_realloc(TargetSize::new(1600, 1200)));
        assert!(target.needs_realloc(TargetSize::new(800, 601)));
    }

    #[test]
    fn test_same_size_keeps_target() {
        let target = TargetSize::new(800, 600);
        assert!(!target.needs_realloc(TargetSize::new(800, 600)));
    }

    #[test]
    fn test_minimized_viewport_ignored() {
        let target = TargetSize::new(800, 600);
        assert!(TargetSize::new(0, 600).is_empty());
        assert!(!target.needs_realloc(TargetSize::new(0, 0)));
        assert!(!target.needs_realloc(TargetSize::new(1600, 0)));
    }
}
