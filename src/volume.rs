//! Smoke volumes: one particle field bound to one depth capture channel.

use glam::{Mat4, Vec3};
use rand::Rng;

use crate::config::{SceneConfig, SmokeVolumeConfig};
use crate::error::ConfigError;
use crate::particles::{FieldConfig, ParticleField};
use crate::registry::Channel;
use crate::textures::SmokeColor;

/// A placed particle field and the channel it reads depth from.
#[derive(Debug, Clone)]
pub struct SmokeVolume {
    config: SmokeVolumeConfig,
    field: ParticleField,
    channel: Channel,
    placement: Mat4,
}

impl SmokeVolume {
    /// Scatter a new field for `config`, positioned relative to `anchor`.
    pub fn new<R: Rng + ?Sized>(
        config: SmokeVolumeConfig,
        field_config: FieldConfig,
        anchor: Vec3,
        channel: Channel,
        rng: &mut R,
    ) -> Self {
        let placement = placement_matrix(anchor, &config);
        Self {
            field: ParticleField::new(field_config, rng),
            config,
            channel,
            placement,
        }
    }

    /// Build every volume a scene describes, assigning capture channels.
    pub fn from_scene<R: Rng + ?Sized>(scene: &SceneConfig, rng: &mut R) -> Result<Vec<Self>, ConfigError> {
        scene.validate()?;
        let field_config = scene.field_config();
        scene
            .volumes
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let channel = scene.channel_for(i).ok_or(ConfigError::TooManyVolumes {
                    count: scene.volumes.len(),
                    max: Channel::ALL.len(),
                })?;
                Ok(Self::new(v.clone(), field_config, scene.group_position, channel, rng))
            })
            .collect()
    }

    pub fn smoke_color(&self) -> SmokeColor {
        self.config.smoke_color
    }

    pub fn config(&self) -> &SmokeVolumeConfig {
        &self.config
    }

    /// Channel whose depth capture this volume's shader samples.
    pub fn capture_channel(&self) -> Channel {
        self.channel
    }

    /// Group transform applied on top of every instance matrix.
    pub fn placement(&self) -> Mat4 {
        self.placement
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut ParticleField {
        &mut self.field
    }

    /// Advance the particle animation by one frame.
    pub fn tick(&mut self) {
        self.field.tick();
    }
}

/// Anchor translation, then the volume's own offset and uniform scale.
pub fn placement_matrix(anchor: Vec3, config: &SmokeVolumeConfig) -> Mat4 {
    Mat4::from_translation(anchor)
        * Mat4::from_scale_rotation_translation(
            Vec3::splat(config.scale),
            glam::Quat::IDENTITY,
            config.position,
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureSharing;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_placement_matrix() {
        let config = SmokeVolumeConfig::new(SmokeColor::Red, 0.4, Vec3::new(-2.0, 0.0, 0.0));
        let m = placement_matrix(Vec3::new(0.5, 1.0, -0.5), &config);

        // Field origin lands at anchor + offset
        let origin = m.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(-1.5, 1.0, -0.5)).length() < 1e-6);

        // Instance offsets are scaled by the volume scale
        let p = m.transform_point3(Vec3::new(5.0, 0.0, 0.0));
        assert!((p - Vec3::new(0.5, 1.0, -0.5)).length() < 1e-5);
    }

    #[test]
    fn test_shared_scene_uses_one_channel() {
        let mut rng = StdRng::seed_from_u64(1);
        let volumes = SmokeVolume::from_scene(&SceneConfig::default(), &mut rng).unwrap();
        assert_eq!(volumes.len(), 3);
        assert!(volumes.iter().all(|v| v.capture_channel() == Channel::Depth));
        assert!(volumes.iter().all(|v| v.field().len() == 100));
    }

    #[test]
    fn test_per_volume_scene_uses_distinct_channels() {
        let scene = SceneConfig {
            capture_sharing: CaptureSharing::PerVolume,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let volumes = SmokeVolume::from_scene(&scene, &mut rng).unwrap();
        let channels: Vec<Channel> = volumes.iter().map(|v| v.capture_channel()).collect();
        assert_eq!(channels, vec![Channel::Depth, Channel::G, Channel::B]);
    }

    #[test]
    fn test_volumes_get_independent_scatter() {
        let mut rng = StdRng::seed_from_u64(3);
        let volumes = SmokeVolume::from_scene(&SceneConfig::default(), &mut rng).unwrap();
        assert_ne!(volumes[0].field().instances(), volumes[1].field().instances());
    }

    #[test]
    fn test_tick_marks_field_dirty() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut volume = SmokeVolume::new(
            SmokeVolumeConfig::new(SmokeColor::Blue, 1.0, Vec3::ZERO),
            FieldConfig::default(),
            Vec3::ZERO,
            Channel::Depth,
            &mut rng,
        );
        let _ = volume.field_mut().take_upload();
        volume.tick();
        assert!(volume.field().is_dirty());
    }
}
