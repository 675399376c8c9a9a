//! Procedural opaque geometry.
//!
//! The scene's solid geometry is generated here rather than loaded. The
//! default logo is a flat cuboid placed where the smoke volumes cross it,
//! which is enough to show the soft intersection fade.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex of an opaque mesh.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Indexed triangle mesh in CPU memory.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u16>,
}

/// Logo slab dimensions (width, height, thickness) at scale 1.
pub const LOGO_SIZE: Vec3 = Vec3::new(3.0, 1.6, 0.6);

impl MeshData {
    /// Axis-aligned box centred on the origin with flat-shaded faces.
    pub fn cuboid(size: Vec3) -> Self {
        let h = size * 0.5;
        // (normal, u axis, v axis) per face; corners wind counter-clockwise
        // when viewed from outside.
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];

        let mut mesh = MeshData::default();
        for (normal, u, v) in faces {
            let base = mesh.vertices.len() as u16;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = (normal + u * su + v * sv) * h;
                mesh.vertices.push(MeshVertex {
                    position: p.to_array(),
                    normal: normal.to_array(),
                });
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// The default logo stand-in.
    pub fn logo() -> Self {
        Self::cuboid(LOGO_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuboid_counts() {
        let mesh = MeshData::cuboid(Vec3::ONE);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn test_cuboid_extent() {
        let size = Vec3::new(2.0, 4.0, 6.0);
        let mesh = MeshData::cuboid(size);
        for v in &mesh.vertices {
            let p = Vec3::from_array(v.position);
            assert!((p.abs() - size * 0.5).abs().max_element() < 1e-6);
        }
    }

    #[test]
    fn test_faces_wind_outward() {
        let mesh = MeshData::cuboid(Vec3::ONE);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from_array(mesh.vertices[i as usize].position));
            let n = Vec3::from_array(mesh.vertices[tri[0] as usize].normal);
            assert!((b - a).cross(c - a).dot(n) > 0.0);
        }
    }
}
