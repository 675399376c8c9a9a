//! WGSL shader programs.
//!
//! Each program is one WGSL module with a `vs_main` vertex entry point, an
//! `fs_main` fragment entry point and a fixed set of uniform bindings. The
//! shared frame uniform block and depth helpers in `shaders/common.wgsl` are
//! prepended to every program.
//!
//! Programs are validated with naga before any pipeline is created, so a
//! broken shader fails at startup with the program and stage named instead
//! of as a device error on first draw.

use naga::front::wgsl;
use naga::valid::{Capabilities, ValidationError, ValidationFlags, Validator};

use crate::error::{ShaderError, ShaderStage};

const COMMON_SOURCE: &str = include_str!("shaders/common.wgsl");

/// Vertex entry point name shared by every program.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Fragment entry point name shared by every program.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// A (vertex stage, fragment stage, uniform set) triple.
#[derive(Debug, Clone, Copy)]
pub struct ShaderProgram {
    pub name: &'static str,
    body: &'static str,
    /// Uniform and texture bindings the program must declare. Entries are
    /// `var` or `var.member`; validation checks each `var` is a global.
    pub uniforms: &'static [&'static str],
}

/// Soft-intersection compositing for smoke billboards.
pub const DEPTH_FADE: ShaderProgram = ShaderProgram {
    name: "depth_fade",
    body: include_str!("shaders/depth_fade.wgsl"),
    uniforms: &[
        "frame.resolution",
        "frame.camera_near",
        "frame.camera_far",
        "frame.elapsed_time",
        "fade_params.fade_range",
        "fade_params.depth_available",
        "color_map",
        "depth_texture",
    ],
};

/// Debug view of a captured depth texture as linear greyscale.
pub const DEPTH_VIEW: ShaderProgram = ShaderProgram {
    name: "depth_view",
    body: include_str!("shaders/depth_view.wgsl"),
    uniforms: &["frame.camera_near", "frame.camera_far", "depth_texture"],
};

/// Lit opaque meshes, used for both the depth capture and the present pass.
pub const OPAQUE: ShaderProgram = ShaderProgram {
    name: "opaque",
    body: include_str!("shaders/opaque.wgsl"),
    uniforms: &["frame.view", "frame.proj", "mesh_params.model", "mesh_params.color"],
};

/// Every program the renderer builds.
pub const ALL_PROGRAMS: [ShaderProgram; 3] = [DEPTH_FADE, DEPTH_VIEW, OPAQUE];

impl ShaderProgram {
    /// Complete WGSL source, including the shared prelude.
    pub fn source(&self) -> String {
        format!("{COMMON_SOURCE}\n{}", self.body)
    }

    /// Parse and validate the program with naga.
    pub fn validate(&self) -> Result<(), ShaderError> {
        validate_wgsl(self.name, &self.source(), self.uniforms)
    }

    /// Validate, then compile into a shader module.
    pub fn create_module(&self, device: &wgpu::Device) -> Result<wgpu::ShaderModule, ShaderError> {
        let source = self.source();
        validate_wgsl(self.name, &source, self.uniforms)?;
        Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(self.name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        }))
    }
}

/// Validate all programs, stopping at the first failure.
pub fn validate_all() -> Result<(), ShaderError> {
    for program in ALL_PROGRAMS {
        program.validate()?;
        log::debug!("shader program '{}' validated", program.name);
    }
    Ok(())
}

fn validate_wgsl(program: &'static str, source: &str, uniforms: &[&str]) -> Result<(), ShaderError> {
    let module = wgsl::parse_str(source).map_err(|err| ShaderError {
        program,
        stage: ShaderStage::Module,
        message: err.emit_to_string(source),
    })?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator.validate(&module).map_err(|err| {
        let stage = match err.as_inner() {
            ValidationError::EntryPoint { stage, .. } => match stage {
                naga::ShaderStage::Vertex => ShaderStage::Vertex,
                naga::ShaderStage::Fragment => ShaderStage::Fragment,
                _ => ShaderStage::Module,
            },
            _ => ShaderStage::Module,
        };
        ShaderError {
            program,
            stage,
            message: err.emit_to_string(source),
        }
    })?;

    for (entry, stage, naga_stage) in [
        (VERTEX_ENTRY, ShaderStage::Vertex, naga::ShaderStage::Vertex),
        (FRAGMENT_ENTRY, ShaderStage::Fragment, naga::ShaderStage::Fragment),
    ] {
        let found = module
            .entry_points
            .iter()
            .any(|ep| ep.name == entry && ep.stage == naga_stage);
        if !found {
            return Err(ShaderError {
                program,
                stage,
                message: format!("missing entry point `{entry}`"),
            });
        }
    }

    for uniform in uniforms {
        let var = uniform.split('.').next().unwrap_or(*uniform);
        let declared = module
            .global_variables
            .iter()
            .any(|(_, global)| global.name.as_deref() == Some(var));
        if !declared {
            return Err(ShaderError {
                program,
                stage: ShaderStage::Module,
                message: format!("missing uniform binding `{uniform}`"),
            });
        }
    }

    Ok(())
}
