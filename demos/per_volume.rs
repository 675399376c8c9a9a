//! Per-volume depth captures.
//!
//! Each smoke volume gets its own capture channel instead of sharing one.
//! The picture is the same as the reference scene; run with
//! `RUST_LOG=debug` to watch each channel publish and bind.
//!
//! Run with: `cargo run --example per_volume`

use smokefade::prelude::*;

fn main() -> Result<(), SceneError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug,wgpu_hal=off,wgpu_core=off,wgpu=off,naga=off"))
        .init();

    SmokeScene::new()
        .with_title("smokefade - per-volume capture")
        .with_capture_sharing(CaptureSharing::PerVolume)
        .with_volume(SmokeVolumeConfig::new(SmokeColor::Red, 0.3, Vec3::new(0.0, 2.0, -1.0)))
        .with_seed(7)
        .run()
}
