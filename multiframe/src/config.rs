use std::path::PathBuf;

use glam::{uvec2, UVec2};
use serde::{Deserialize, Serialize};

use crate::{GiParams, RenderToggles};

/// Size of the virtual viewport used when full-HD rendering is enabled.
pub const FULL_HD: UVec2 = uvec2(1920, 1080);

/// Everything [`crate::MultiFramePainter`] needs to get started.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PainterConfig {
    /// Initial size of the host's viewport
    pub viewport_size: UVec2,

    /// Render into a fixed 1920x1080 viewport, regardless of the host's size
    pub full_hd: bool,

    /// Directory shader sources are preferably loaded from
    pub shader_dir: Option<PathBuf>,

    /// Seed of the VPL shuffle permutation and of the sub-frame kernels
    pub seed: u64,

    pub toggles: RenderToggles,
    pub gi: GiParams,
}

impl PainterConfig {
    /// Returns the size stages render at.
    pub fn virtual_viewport_size(&self) -> UVec2 {
        if self.full_hd {
            FULL_HD
        } else {
            self.viewport_size
        }
    }
}

impl Default for PainterConfig {
    fn default() -> Self {
        Self {
            viewport_size: uvec2(1280, 720),
            full_hd: false,
            shader_dir: None,
            seed: 1234,
            toggles: Default::default(),
            gi: Default::default(),
        }
    }
}
