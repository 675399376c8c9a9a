//! GPU uniform layouts shared by the WGSL programs.
//!
//! Field order and padding mirror the `struct` declarations in
//! `src/shaders/*.wgsl`. WGSL rounds uniform struct sizes up to 16 bytes,
//! so each Rust struct carries explicit tail padding.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec4};

/// Per-frame camera and timing data (bind group 0 in every program).
///
/// Written once per frame, before the encoder records any pass, so the
/// depth capture and the final present see the same camera.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub resolution: [f32; 2],
    pub camera_near: f32,
    pub camera_far: f32,
    pub elapsed_time: f32,
    pub _padding: [f32; 3],
}

impl FrameUniforms {
    pub fn new(view: Mat4, proj: Mat4, resolution: Vec2, near: f32, far: f32, elapsed_time: f32) -> Self {
        Self {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            resolution: resolution.to_array(),
            camera_near: near,
            camera_far: far,
            elapsed_time,
            _padding: [0.0; 3],
        }
    }
}

/// Per-field uniforms for the depth-fade program (bind group 1, binding 0).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FadeUniforms {
    /// Volume placement (group scale and position).
    pub placement: [[f32; 4]; 4],
    pub fade_range: [f32; 2],
    /// 0 when no depth capture is bound; the shader then never fades.
    pub depth_available: u32,
    pub _padding: u32,
}

impl FadeUniforms {
    pub fn new(placement: Mat4, fade_range: Vec2, depth_available: bool) -> Self {
        Self {
            placement: placement.to_cols_array_2d(),
            fade_range: fade_range.to_array(),
            depth_available: depth_available as u32,
            _padding: 0,
        }
    }
}

/// Per-mesh uniforms for the opaque scene program.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshUniforms {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl MeshUniforms {
    pub fn new(model: Mat4, color: Vec4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: color.to_array(),
        }
    }
}

/// One particle instance as uploaded to the instance vertex buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
}

impl InstanceRaw {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x4,
        1 => Float32x4,
        2 => Float32x4,
        3 => Float32x4,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

impl From<&Mat4> for InstanceRaw {
    fn from(m: &Mat4) -> Self {
        Self { model: m.to_cols_array_2d() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_match_wgsl_layout() {
        // view + proj (128) + resolution (8) + near/far/time (12), rounded to 16
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 160);
        // placement (64) + fade_range (8) + depth_available (4), rounded to 16
        assert_eq!(std::mem::size_of::<FadeUniforms>(), 80);
        assert_eq!(std::mem::size_of::<MeshUniforms>(), 80);
        assert_eq!(std::mem::size_of::<InstanceRaw>(), 64);
    }

    #[test]
    fn test_fade_uniforms_flag() {
        let on = FadeUniforms::new(Mat4::IDENTITY, Vec2::new(0.0, 0.8), true);
        let off = FadeUniforms::new(Mat4::IDENTITY, Vec2::new(0.0, 0.8), false);
        assert_eq!(on.depth_available, 1);
        assert_eq!(off.depth_available, 0);
        assert_eq!(on.fade_range, [0.0, 0.8]);
    }
}
