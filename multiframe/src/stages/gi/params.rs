use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{gpu, Macros, Sun};

/// Tunables of the GI pipeline.
///
/// Fields that alter the final-gathering shader are private; their setters
/// raise a flag the stage picks up on its next `process()`.
///
/// Deserialization goes through the setters too, so a persisted VPL range
/// that breaks `start < end <= VPL_COUNT` falls back to the default bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawGiParams")]
pub struct GiParams {
    pub light_intensity: f32,
    pub gi_factor: f32,
    pub vpl_clamping: f32,
    vpl_start: u32,
    vpl_end: u32,
    pub tess_factor: f32,
    pub use_push_pull: bool,
    scale_isms: bool,
    pub points_only_into_scaled: bool,
    shadowing: bool,
    show_vpl_positions: bool,
    use_interleaving: bool,
    pub shuffle: bool,
    pub sun: Sun,

    #[serde(skip)]
    fg_dirty: bool,
}

impl GiParams {
    pub fn vpl_start(&self) -> u32 {
        self.vpl_start
    }

    /// Sets the first active VPL; values that would leave the range empty
    /// are ignored.
    pub fn set_vpl_start(&mut self, value: u32) {
        if value < self.vpl_end {
            self.vpl_start = value;
        }
    }

    pub fn vpl_end(&self) -> u32 {
        self.vpl_end
    }

    /// Sets the one-past-last active VPL; values that would leave the range
    /// empty or go past `VPL_COUNT` are ignored.
    pub fn set_vpl_end(&mut self, value: u32) {
        if value > self.vpl_start && value <= gpu::VPL_COUNT as u32 {
            self.vpl_end = value;
        }
    }

    pub fn vpl_range(&self) -> Range<u32> {
        self.vpl_start..self.vpl_end
    }

    pub fn scale_isms(&self) -> bool {
        self.scale_isms
    }

    pub fn set_scale_isms(&mut self, value: bool) {
        self.scale_isms = value;
        self.fg_dirty = true;
    }

    pub fn shadowing(&self) -> bool {
        self.shadowing
    }

    pub fn set_shadowing(&mut self, value: bool) {
        self.shadowing = value;
        self.fg_dirty = true;
    }

    pub fn show_vpl_positions(&self) -> bool {
        self.show_vpl_positions
    }

    pub fn set_show_vpl_positions(&mut self, value: bool) {
        self.show_vpl_positions = value;
        self.fg_dirty = true;
    }

    pub fn use_interleaving(&self) -> bool {
        self.use_interleaving
    }

    pub fn set_use_interleaving(&mut self, value: bool) {
        self.use_interleaving = value;
        self.fg_dirty = true;
    }

    /// Returns whether the final-gathering shader has to be rebuilt.
    pub fn fg_dirty(&self) -> bool {
        self.fg_dirty
    }

    pub(crate) fn mark_fg_dirty(&mut self) {
        self.fg_dirty = true;
    }

    pub(crate) fn clear_fg_dirty(&mut self) {
        self.fg_dirty = false;
    }

    pub fn fg_variant(&self) -> FinalGatheringVariant {
        FinalGatheringVariant {
            shadowing: self.shadowing,
            show_vpl_positions: self.show_vpl_positions,
            use_interleaving: self.use_interleaving,
            scale_isms: self.scale_isms,
        }
    }

    /// Returns the number of workgroups final gathering needs along an axis
    /// of given size, rounded up to a multiple of the interleave factor.
    pub fn fg_groups(dim: u32) -> u32 {
        let interleave = gpu::FINAL_GATHERING_INTERLEAVE;

        crate::utils::ceil_div(
            dim,
            gpu::FINAL_GATHERING_WORKGROUP_SIZE * interleave,
        ) * interleave
    }
}

impl Default for GiParams {
    fn default() -> Self {
        Self {
            light_intensity: 5.0,
            gi_factor: 3000.0,
            vpl_clamping: 0.001,
            vpl_start: 0,
            vpl_end: gpu::VPL_COUNT as u32,
            tess_factor: 2.0,
            use_push_pull: true,
            scale_isms: false,
            points_only_into_scaled: false,
            shadowing: true,
            show_vpl_positions: false,
            use_interleaving: true,
            shuffle: true,
            sun: Sun::default(),
            fg_dirty: true,
        }
    }
}

/// Unvalidated mirror of [`GiParams`], as it comes out of a config file.
#[derive(Deserialize)]
#[serde(default)]
struct RawGiParams {
    light_intensity: f32,
    gi_factor: f32,
    vpl_clamping: f32,
    vpl_start: u32,
    vpl_end: u32,
    tess_factor: f32,
    use_push_pull: bool,
    scale_isms: bool,
    points_only_into_scaled: bool,
    shadowing: bool,
    show_vpl_positions: bool,
    use_interleaving: bool,
    shuffle: bool,
    sun: Sun,
}

impl Default for RawGiParams {
    fn default() -> Self {
        let params = GiParams::default();

        Self {
            light_intensity: params.light_intensity,
            gi_factor: params.gi_factor,
            vpl_clamping: params.vpl_clamping,
            vpl_start: params.vpl_start,
            vpl_end: params.vpl_end,
            tess_factor: params.tess_factor,
            use_push_pull: params.use_push_pull,
            scale_isms: params.scale_isms,
            points_only_into_scaled: params.points_only_into_scaled,
            shadowing: params.shadowing,
            show_vpl_positions: params.show_vpl_positions,
            use_interleaving: params.use_interleaving,
            shuffle: params.shuffle,
            sun: params.sun,
        }
    }
}

impl From<RawGiParams> for GiParams {
    fn from(raw: RawGiParams) -> Self {
        let mut params = Self {
            light_intensity: raw.light_intensity,
            gi_factor: raw.gi_factor,
            vpl_clamping: raw.vpl_clamping,
            tess_factor: raw.tess_factor,
            use_push_pull: raw.use_push_pull,
            scale_isms: raw.scale_isms,
            points_only_into_scaled: raw.points_only_into_scaled,
            shadowing: raw.shadowing,
            show_vpl_positions: raw.show_vpl_positions,
            use_interleaving: raw.use_interleaving,
            shuffle: raw.shuffle,
            sun: raw.sun,
            ..Default::default()
        };

        params.set_vpl_end(raw.vpl_end);
        params.set_vpl_start(raw.vpl_start);
        params
    }
}

/// Toggles baked into the final-gathering shader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FinalGatheringVariant {
    pub shadowing: bool,
    pub show_vpl_positions: bool,
    pub use_interleaving: bool,
    pub scale_isms: bool,
}

impl FinalGatheringVariant {
    pub fn macros(self) -> Macros {
        Macros::new()
            .set("ENABLE_SHADOWING", self.shadowing)
            .set("SHOW_VPL_POSITIONS", self.show_vpl_positions)
            .set("USE_INTERLEAVING", self.use_interleaving)
            .set("SCALE_ISMS", self.scale_isms)
    }
}
