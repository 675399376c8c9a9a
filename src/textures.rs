//! Smoke sprite textures.
//!
//! Each smoke volume is drawn with one of a fixed set of named sprites.
//! Sprites are loaded from `<assets_dir>/<name>.png`; when a file is missing
//! or unreadable a procedural puff in the sprite's tint is used instead, so
//! a scene never fails to start over art.
//!
//! # Supported Formats
//!
//! - PNG (recommended)
//! - JPEG

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TextureError;

/// Side length of the generated fallback sprite.
const FALLBACK_SIZE: u32 = 128;

/// Named smoke sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SmokeColor {
    #[serde(rename = "redsmoke")]
    Red,
    #[serde(rename = "greensmoke")]
    Green,
    #[serde(rename = "bluesmoke")]
    Blue,
}

impl SmokeColor {
    pub const ALL: [SmokeColor; 3] = [SmokeColor::Red, SmokeColor::Green, SmokeColor::Blue];

    /// Asset name, also used as the file stem.
    pub fn name(self) -> &'static str {
        match self {
            SmokeColor::Red => "redsmoke",
            SmokeColor::Green => "greensmoke",
            SmokeColor::Blue => "bluesmoke",
        }
    }

    /// Tint of the procedural fallback.
    pub fn tint(self) -> [u8; 3] {
        match self {
            SmokeColor::Red => [230, 70, 60],
            SmokeColor::Green => [80, 220, 110],
            SmokeColor::Blue => [70, 130, 240],
        }
    }
}

impl fmt::Display for SmokeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded RGBA8 sprite ready for upload.
#[derive(Debug, Clone)]
pub struct SpriteImage {
    /// Raw RGBA pixel data (width * height * 4 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl SpriteImage {
    /// Load a sprite from an image file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TextureError> {
        let bytes = std::fs::read(path.as_ref())?;
        let img = image::load_from_memory(&bytes)?.into_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self {
            data: img.into_raw(),
            width,
            height,
        })
    }

    /// Load `color`'s sprite from `assets_dir`, falling back to a generated
    /// puff if the file can't be used.
    pub fn load_or_generate(assets_dir: &Path, color: SmokeColor) -> Self {
        let path = assets_dir.join(format!("{}.png", color.name()));
        match Self::from_file(&path) {
            Ok(sprite) => {
                log::info!("smoke sprite '{}': {}x{} from {}", color, sprite.width, sprite.height, path.display());
                sprite
            }
            Err(e) => {
                log::warn!("smoke sprite '{}': {} ({}); using generated sprite", color, e, path.display());
                Self::generate(color, FALLBACK_SIZE)
            }
        }
    }

    /// Soft round puff with hashed noise, tinted for `color`.
    ///
    /// Alpha falls off radially and is kept at or below 0.5 so the depth
    /// fade (which doubles sprite alpha before clamping) still reaches the
    /// sprite's edge smoothly.
    pub fn generate(color: SmokeColor, size: u32) -> Self {
        let [r, g, b] = color.tint();
        let seed = color as u32 + 1;
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        let half = size as f32 * 0.5;

        for y in 0..size {
            for x in 0..size {
                let dx = (x as f32 + 0.5 - half) / half;
                let dy = (y as f32 + 0.5 - half) / half;
                let dist = (dx * dx + dy * dy).sqrt();

                let falloff = (1.0 - dist).clamp(0.0, 1.0);
                let falloff = falloff * falloff;
                let noise = 0.6 + 0.4 * (hash_noise(x / 4, y / 4, seed) as f32 / 255.0);
                let alpha = (falloff * noise * 0.5 * 255.0).round() as u8;

                data.extend_from_slice(&[r, g, b, alpha]);
            }
        }

        Self {
            data,
            width: size,
            height: size,
        }
    }
}

/// Simple hash-based noise function.
fn hash_noise(x: u32, y: u32, seed: u32) -> u8 {
    let mut n = x
        .wrapping_mul(374761393)
        .wrapping_add(y.wrapping_mul(668265263))
        .wrapping_add(seed.wrapping_mul(1013904223));
    n = (n ^ (n >> 13)).wrapping_mul(1274126177);
    n = n ^ (n >> 16);
    (n & 255) as u8
}
