//! CPU reference of the depth-fade math.
//!
//! Every function here has a twin in `shaders/depth_fade.wgsl` and must
//! stay numerically identical to it. Tests use these to pin down the fade
//! contract without a GPU.
//!
//! Depth conventions follow `glam::Mat4::perspective_rh`, which is what
//! [`Camera`](crate::camera::Camera) uses: view space looks down -Z and
//! projected depth runs from 0 at the near plane to 1 at the far plane.

use glam::Vec2;

/// Default fade band: particles are invisible at zero separation from the
/// scene and fully visible 0.8 units in front of it.
pub const DEFAULT_FADE_RANGE: Vec2 = Vec2::new(0.0, 0.8);

/// Cubic Hermite smooth step, same as WGSL `smoothstep`.
///
/// Returns 0 below `edge0`, 1 above `edge1` and `t²(3 - 2t)` in between.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Convert a projected depth value back to view-space Z (negative in front
/// of the camera).
pub fn perspective_depth_to_view_z(depth: f32, near: f32, far: f32) -> f32 {
    (near * far) / ((far - near) * depth - far)
}

/// Inverse of [`perspective_depth_to_view_z`].
pub fn view_z_to_perspective_depth(view_z: f32, near: f32, far: f32) -> f32 {
    far * (view_z + near) / ((far - near) * view_z)
}

/// Map view-space Z to a linear 0..1 depth between the planes.
///
/// Used by the depth-visualization overlay.
pub fn view_z_to_orthographic_depth(view_z: f32, near: f32, far: f32) -> f32 {
    (view_z + near) / (near - far)
}

/// Soft intersection factor for a particle fragment.
///
/// `particle_view_z` is the fragment's own view-space Z and `scene_depth`
/// the captured projected depth at the same pixel. `None` means no depth
/// capture is available yet, in which case nothing is occluded.
pub fn fade_factor(
    particle_view_z: f32,
    scene_depth: Option<f32>,
    near: f32,
    far: f32,
    range: Vec2,
) -> f32 {
    match scene_depth {
        Some(depth) => {
            let scene_z = perspective_depth_to_view_z(depth, near, far);
            smoothstep(range.x, range.y, particle_view_z - scene_z)
        }
        None => 1.0,
    }
}

/// Final alpha written by the depth-fade program.
pub fn composite_alpha(sprite_alpha: f32, fade: f32) -> f32 {
    (sprite_alpha * 2.0).min(fade)
}

/// Quantize a 0..1 depth the way a `Depth16Unorm` attachment stores it.
pub fn quantize_depth16(depth: f32) -> f32 {
    let max = u16::MAX as f32;
    (depth.clamp(0.0, 1.0) * max).round() / max
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3, Vec4};

    const NEAR: f32 = 0.1;
    const FAR: f32 = 200.0;

    fn fade(d: f32) -> f32 {
        smoothstep(DEFAULT_FADE_RANGE.x, DEFAULT_FADE_RANGE.y, d)
    }

    #[test]
    fn test_fade_zero_behind_geometry() {
        for d in [-100.0, -1.0, -0.001, 0.0] {
            assert_eq!(fade(d), 0.0, "d = {d}");
        }
    }

    #[test]
    fn test_fade_one_past_range() {
        for d in [0.8, 0.81, 1.0, 50.0] {
            assert_eq!(fade(d), 1.0, "d = {d}");
        }
    }

    #[test]
    fn test_fade_strictly_increasing_inside_band() {
        let mut prev = 0.0;
        for i in 1..80 {
            let d = i as f32 * 0.01;
            let f = fade(d);
            assert!(f > 0.0 && f < 1.0, "d = {d}, f = {f}");
            assert!(f > prev, "not increasing at d = {d}");
            prev = f;
        }
    }

    #[test]
    fn test_fade_matches_hermite_curve() {
        // Domain midpoint of [0, 0.8] is exactly 0.5
        assert!((fade(0.4) - 0.5).abs() < 1e-6);

        // Not a linear ramp
        let quarter = fade(0.2);
        let t: f32 = 0.25;
        assert!((quarter - t * t * (3.0 - 2.0 * t)).abs() < 1e-6);
        assert!((quarter - 0.25).abs() > 0.05);
    }

    #[test]
    fn test_composite_alpha_is_min() {
        assert_eq!(composite_alpha(0.2, 1.0), 0.4);
        assert_eq!(composite_alpha(0.9, 0.5), 0.5);
        assert_eq!(composite_alpha(1.0, 0.0), 0.0);
        assert_eq!(composite_alpha(0.0, 1.0), 0.0);
    }

    #[test]
    fn test_composite_alpha_monotonic() {
        let steps: Vec<f32> = (0..=20).map(|i| i as f32 / 20.0).collect();
        for &a in &steps {
            for w in steps.windows(2) {
                assert!(composite_alpha(a, w[0]) <= composite_alpha(a, w[1]));
                assert!(composite_alpha(w[0], a) <= composite_alpha(w[1], a));
            }
        }
    }

    #[test]
    fn test_depth_round_trip() {
        for z in [-0.1, -0.5, -5.0, -42.0, -199.0] {
            let d = view_z_to_perspective_depth(z, NEAR, FAR);
            assert!((0.0..=1.0).contains(&d));
            let back = perspective_depth_to_view_z(d, NEAR, FAR);
            assert!((back - z).abs() < 1e-3 * z.abs(), "{z} -> {d} -> {back}");
        }
    }

    #[test]
    fn test_depth_planes() {
        assert!(view_z_to_perspective_depth(-NEAR, NEAR, FAR).abs() < 1e-6);
        assert!((view_z_to_perspective_depth(-FAR, NEAR, FAR) - 1.0).abs() < 1e-6);
        assert!(view_z_to_orthographic_depth(-NEAR, NEAR, FAR).abs() < 1e-6);
        assert!((view_z_to_orthographic_depth(-FAR, NEAR, FAR) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_depth_never_occludes() {
        assert_eq!(fade_factor(-100.0, None, NEAR, FAR, DEFAULT_FADE_RANGE), 1.0);
    }

    /// Camera at the origin looking down -Z, an opaque quad at z = -5 in the
    /// capture, and particles on either side of it.
    #[test]
    fn test_end_to_end_quad_occlusion() {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(45f32.to_radians(), 800.0 / 600.0, NEAR, FAR);

        // What the capture pass writes for the quad
        let clip = proj * view * Vec4::new(0.0, 0.0, -5.0, 1.0);
        let captured = quantize_depth16(clip.z / clip.w);

        let view_z = |z: f32| (view * Vec4::new(0.0, 0.0, z, 1.0)).z;

        let behind = fade_factor(view_z(-5.5), Some(captured), NEAR, FAR, DEFAULT_FADE_RANGE);
        assert_eq!(behind, 0.0);

        let in_front = fade_factor(view_z(-4.0), Some(captured), NEAR, FAR, DEFAULT_FADE_RANGE);
        assert_eq!(in_front, 1.0);
        assert_eq!(composite_alpha(0.3, in_front), 0.6);
    }

    #[test]
    fn test_projection_matches_reference_formula() {
        let proj = Mat4::perspective_rh(1.0, 1.5, NEAR, FAR);
        for z in [-0.2, -3.0, -77.0] {
            let clip = proj * Vec4::new(0.3, -0.2, z, 1.0);
            let d = clip.z / clip.w;
            assert!((d - view_z_to_perspective_depth(z, NEAR, FAR)).abs() < 1e-5);
        }
    }
}
