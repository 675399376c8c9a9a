//! Reference scene viewer.
//!
//! Usage: `smokefade [config.json]`. Without a config the built-in scene
//! is used. Set `RUST_LOG=debug` for capture and rebind traces.

use std::process::ExitCode;

use smokefade::{SceneConfig, SceneError, SmokeScene};

fn main() -> ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info,wgpu_hal=off,wgpu_core=off,wgpu=off,naga=off"),
    )
    .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("smokefade: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), SceneError> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => {
            log::info!("loading scene from {}", path.to_string_lossy());
            SceneConfig::from_path(path)?
        }
        None => SceneConfig::default(),
    };
    SmokeScene::from_config(config).run()
}
