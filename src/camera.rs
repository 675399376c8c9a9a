//! Orbit camera shared by the depth capture and the final present.

use glam::{Mat4, Vec3};

/// Orbit camera for viewing the scene.
///
/// The same instance drives both the depth capture and the present pass.
/// The depth-fade shader reconstructs view-space depth from `near`/`far`, so
/// they must never differ between the two.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Horizontal rotation angle in radians.
    pub yaw: f32,
    /// Vertical rotation angle in radians.
    pub pitch: f32,
    /// Distance from the target point.
    pub distance: f32,
    /// Point the camera orbits around.
    pub target: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Near clip plane.
    pub near: f32,
    /// Far clip plane.
    pub far: f32,
}

impl Camera {
    /// Camera on the +Z axis looking at the origin.
    pub fn new(fov_degrees: f32, near: f32, far: f32, distance: f32) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            distance,
            target: Vec3::ZERO,
            fov_y: fov_degrees.to_radians(),
            near,
            far,
        }
    }

    /// Calculate the camera's world position.
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    /// Calculate the view matrix for rendering.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    /// Perspective projection with 0..1 depth.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far)
    }

    /// Apply a mouse drag, in pixels.
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.yaw -= dx * 0.005;
        self.pitch = (self.pitch + dy * 0.005).clamp(-1.5, 1.5);
    }

    /// Apply a scroll amount, clamped so the camera never crosses the near
    /// plane or leaves the far plane behind.
    pub fn zoom(&mut self, scroll: f32) {
        let max = (self.far * 0.5).max(1.0);
        self.distance = (self.distance - scroll * 0.3).clamp(0.5, max);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(45.0, 0.1, 200.0, 10.0)
    }
}
