//! Pipeline configuration.
//!
//! Every struct has a `Default` matching the reference hardware setup
//! (640x480 at 60 fps, three capture buffers), so an empty TOML file is a
//! valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

// ── Sections ──────────────────────────────────────────────────────────────

/// Capture settings for the camera feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Buffers allocated to the producer's pool.
    pub buffers: usize,
    /// Bounded wait for a filled buffer in `dequeue`.
    pub dequeue_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 60,
            buffers: 3,
            dequeue_timeout_ms: 1000,
        }
    }
}

impl CameraConfig {
    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    /// Nominal time between frames; zero fps means "as fast as possible".
    pub fn frame_interval(&self) -> Duration {
        match self.fps {
            0 => Duration::ZERO,
            fps => Duration::from_secs_f64(1.0 / fps as f64),
        }
    }
}

/// Procedural lens correction, used when no displacement file is given.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LensConfig {
    /// Radial polynomial coefficients `k0..k3`.
    pub k: [f32; 4],
    /// Grid points per axis.
    pub mesh_points: u32,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self { k: [5.12, -0.36, 0.0, 1.0], mesh_points: 32 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
    pub apply_ldc: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { width: 640, height: 480, apply_ldc: true }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self { width: 640, height: 480 }
    }
}

/// Font atlas for on-screen labels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FontConfig {
    pub atlas: PathBuf,
    /// Characters in atlas order. Must contain the DEL sentinel (0x7f).
    pub charset: String,
    #[serde(default = "default_font_size")]
    pub size: f32,
}

fn default_font_size() -> f32 {
    0.05
}

// ── Top level ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub camera: CameraConfig,
    /// Precomputed displacement mesh. Takes precedence over `lens`.
    pub ldc_file: Option<PathBuf>,
    pub lens: Option<LensConfig>,
    /// Directory to load shaders from instead of the built-in sources.
    pub shader_dir: Option<PathBuf>,
    pub output: OutputConfig,
    pub screen: ScreenConfig,
    /// Static texture to show instead of a camera feed.
    pub texture: Option<PathBuf>,
    pub font: Option<FontConfig>,
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(path, &content)
    }

    /// Parses TOML text; `path` is only used in error messages.
    pub fn parse(path: impl AsRef<Path>, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config {
            path: path.as_ref().to_path_buf(),
            message: format!("invalid TOML: {e}"),
        })
    }
}
