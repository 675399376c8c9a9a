//! CPU side of a particle field: the N×N instance grid and its transforms.
//!
//! Instances are laid out on a grid and scattered with a trigonometric
//! spread, then spun slowly around their view-facing axis. Every change
//! recomputes the affected matrix and marks the field dirty; the GPU side
//! drains the dirty flag with [`ParticleField::take_upload`] before the
//! present pass, so a stale buffer is never drawn.

use std::f32::consts::{PI, TAU};

use glam::{Mat4, Quat, Vec3};
use rand::Rng;

/// Default grid edge length (the field holds `N * N` instances).
pub const DEFAULT_GRID_SIZE: u32 = 10;
/// Default Z rotation added per frame, in radians.
pub const DEFAULT_ROTATION_STEP: f32 = 0.01;
/// Maximum XY offset from the field origin.
pub const SPREAD: f32 = 5.0;
/// Maximum Z offset from the field origin.
pub const DEPTH_JITTER: f32 = 1.5;
/// Instance scale range.
pub const MIN_SCALE: f32 = 1.0;
pub const MAX_SCALE: f32 = 5.0;

/// Settings for one particle field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldConfig {
    /// Grid edge length.
    pub grid_size: u32,
    /// Z rotation added on every [`ParticleField::tick`].
    pub rotation_step: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            rotation_step: DEFAULT_ROTATION_STEP,
        }
    }
}

/// One billboard in a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleInstance {
    pub position: Vec3,
    /// Rotation around the quad normal, in radians.
    pub rotation_z: f32,
    /// Uniform scale.
    pub scale: f32,
}

impl ParticleInstance {
    /// Scatter an instance for grid cell `(x, y)`.
    ///
    /// `x` and `y` run from `-N/2` to `N/2 - 1`; their sum sets the angle of
    /// the trigonometric spread so the field forms a loose ring.
    pub fn scatter<R: Rng + ?Sized>(x: i64, y: i64, rng: &mut R) -> Self {
        let angle = (x + y) as f32;
        let position = Vec3::new(
            angle.sin() * rng.gen::<f32>() * SPREAD,
            angle.cos() * rng.gen::<f32>() * SPREAD,
            rng.gen::<f32>() * DEPTH_JITTER,
        );
        Self {
            position,
            rotation_z: rng.gen::<f32>() * PI,
            scale: rng.gen::<f32>() * (MAX_SCALE - MIN_SCALE) + MIN_SCALE,
        }
    }

    /// Local transform of this instance within its field.
    pub fn transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            Quat::from_rotation_z(self.rotation_z),
            self.position,
        )
    }
}

/// A grid of billboard instances with cached transforms.
#[derive(Debug, Clone)]
pub struct ParticleField {
    config: FieldConfig,
    instances: Vec<ParticleInstance>,
    matrices: Vec<Mat4>,
    dirty: bool,
}

impl ParticleField {
    /// Scatter `grid_size²` instances and compute their transforms.
    ///
    /// The field starts dirty so the first frame uploads every matrix.
    pub fn new<R: Rng + ?Sized>(config: FieldConfig, rng: &mut R) -> Self {
        let n = i64::from(config.grid_size);
        let half = n / 2;

        let mut instances = Vec::with_capacity((config.grid_size as usize).pow(2));
        for x in -half..n - half {
            for y in -half..n - half {
                instances.push(ParticleInstance::scatter(x, y, rng));
            }
        }
        let matrices = instances.iter().map(ParticleInstance::transform).collect();

        Self {
            config,
            instances,
            matrices,
            dirty: true,
        }
    }

    /// Number of instances (`grid_size²`).
    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn instances(&self) -> &[ParticleInstance] {
        &self.instances
    }

    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }

    /// Whether matrices changed since the last upload.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Advance one frame: spin every instance by the rotation step.
    ///
    /// Rotation stays wrapped to `[0, 2π)` so long sessions keep full
    /// `f32` precision.
    pub fn tick(&mut self) {
        let step = self.config.rotation_step;
        for (instance, matrix) in self.instances.iter_mut().zip(self.matrices.iter_mut()) {
            instance.rotation_z = (instance.rotation_z + step).rem_euclid(TAU);
            *matrix = instance.transform();
        }
        self.dirty = true;
    }

    /// Replace one instance, keeping its matrix in sync.
    pub fn set_instance(&mut self, index: usize, instance: ParticleInstance) {
        self.instances[index] = instance;
        self.matrices[index] = instance.transform();
        self.dirty = true;
    }

    /// Matrices to upload, if any changed. Clears the dirty flag.
    ///
    /// Always returns the whole slice; rotation is the only thing that
    /// moves per frame but the buffer is rewritten in full.
    pub fn take_upload(&mut self) -> Option<&[Mat4]> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(&self.matrices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn field(grid_size: u32) -> ParticleField {
        let mut rng = StdRng::seed_from_u64(7);
        ParticleField::new(
            FieldConfig {
                grid_size,
                ..Default::default()
            },
            &mut rng,
        )
    }

    #[test]
    fn test_field_size() {
        assert_eq!(field(10).len(), 100);
        assert_eq!(field(3).len(), 9);
        assert_eq!(field(1).len(), 1);
    }

    #[test]
    fn test_scatter_bounds() {
        let field = field(10);
        for p in field.instances() {
            assert!(p.position.x.abs() <= SPREAD);
            assert!(p.position.y.abs() <= SPREAD);
            assert!((0.0..DEPTH_JITTER).contains(&p.position.z));
            assert!((MIN_SCALE..MAX_SCALE).contains(&p.scale));
            assert!((0.0..PI).contains(&p.rotation_z));
        }
    }

    #[test]
    fn test_transform_round_trip() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let instance = ParticleInstance {
                position: Vec3::new(
                    rng.gen_range(-SPREAD..SPREAD),
                    rng.gen_range(-SPREAD..SPREAD),
                    rng.gen_range(0.0..DEPTH_JITTER),
                ),
                rotation_z: rng.gen_range(0.0..PI),
                scale: rng.gen_range(MIN_SCALE..MAX_SCALE),
            };

            let (scale, rotation, translation) = instance.transform().to_scale_rotation_translation();
            assert!((translation - instance.position).length() < 1e-4);
            assert!((scale - Vec3::splat(instance.scale)).abs().max_element() < 1e-4);

            // Only Z is ever rotated
            let (_, _, z) = rotation.to_euler(glam::EulerRot::XYZ);
            let expected = Quat::from_rotation_z(instance.rotation_z);
            assert!(rotation.angle_between(expected) < 1e-3, "recovered z = {z}");
        }
    }

    #[test]
    fn test_starts_dirty_and_upload_clears() {
        let mut field = field(4);
        assert!(field.is_dirty());
        assert_eq!(field.take_upload().map(|m| m.len()), Some(16));
        assert!(!field.is_dirty());
        assert!(field.take_upload().is_none());
    }

    #[test]
    fn test_tick_rotates_and_marks_dirty() {
        let mut field = field(4);
        let _ = field.take_upload();
        let before: Vec<f32> = field.instances().iter().map(|p| p.rotation_z).collect();

        field.tick();

        assert!(field.is_dirty());
        for (p, r) in field.instances().iter().zip(&before) {
            assert!((p.rotation_z - (r + DEFAULT_ROTATION_STEP)).abs() < 1e-6);
        }
        // Matrices follow the new rotation
        for (p, m) in field.instances().iter().zip(field.matrices()) {
            assert!(m.abs_diff_eq(p.transform(), 1e-6));
        }
    }

    #[test]
    fn test_set_instance_updates_matrix() {
        let mut field = field(2);
        let _ = field.take_upload();
        let instance = ParticleInstance {
            position: Vec3::new(1.0, 2.0, 0.5),
            rotation_z: 0.3,
            scale: 2.0,
        };
        field.set_instance(3, instance);
        assert!(field.is_dirty());
        assert!(field.matrices()[3].abs_diff_eq(instance.transform(), 1e-6));
    }

    #[test]
    fn test_rotation_wraps() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut field = ParticleField::new(
            FieldConfig {
                grid_size: 1,
                rotation_step: 1.0,
            },
            &mut rng,
        );
        let start = field.instances()[0].rotation_z;
        for _ in 0..1000 {
            field.tick();
        }
        let rotation = field.instances()[0].rotation_z;
        assert!((0.0..TAU).contains(&rotation));

        let expected = (start as f64 + 1000.0).rem_euclid(std::f64::consts::TAU) as f32;
        let diff = (rotation - expected).rem_euclid(TAU);
        assert!(diff.min(TAU - diff) < 1e-3, "{rotation} vs {expected}");
    }

    #[test]
    fn test_rotation_advances_late_in_session() {
        let mut field = field(1);
        let mut instance = field.instances()[0];
        // 120 hours at 60 fps
        instance.rotation_z = 25_920_000.0 * DEFAULT_ROTATION_STEP;
        field.set_instance(0, instance);

        field.tick();
        let before = field.instances()[0].rotation_z;
        field.tick();
        let after = field.instances()[0].rotation_z;
        let delta = (after - before).rem_euclid(TAU);
        assert!((delta - DEFAULT_ROTATION_STEP).abs() < 1e-5, "step was {delta}");
    }

    #[test]
    fn test_seeded_fields_match() {
        let a = field(5);
        let b = field(5);
        assert_eq!(a.instances(), b.instances());
    }
}
