use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec4, Vec4};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RasterPassParams {
    pub view: Mat4,
    pub projection: Mat4,

    /// Camera eye (xyz) + unused (w)
    pub camera_eye: Vec4,

    /// Light position of this sub-frame (xyz) + unused (w)
    pub light_position: Vec4,

    /// Ground plane color (rgb) + unused (w)
    pub ground_color: Vec4,

    /// NDC offset (xy) + circle-of-confusion point (zw)
    pub jitter: Vec4,

    /// Shininess (x) + focal distance (y) + bump type (z) + unused (w)
    pub material: Vec4,

    /// Preset alpha (x) + masks offset (y) + point shadow far plane (z) +
    /// unused (w)
    pub transparency: Vec4,

    /// Flags (x, see `RasterPassParams::HAS_*`) + unused (yzw)
    pub flags: UVec4,
}

impl RasterPassParams {
    pub const HAS_DIFFUSE: u32 = 1 << 0;
    pub const HAS_SPECULAR: u32 = 1 << 1;
    pub const HAS_EMISSIVE: u32 = 1 << 2;
    pub const HAS_OPACITY: u32 = 1 << 3;
    pub const HAS_BUMP: u32 = 1 << 4;
    pub const IS_GROUND: u32 = 1 << 5;
    pub const USE_REFLECTIONS: u32 = 1 << 6;
    pub const HAS_POINT_SHADOW: u32 = 1 << 7;

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags.x & flag != 0
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ShadowmapPassParams {
    pub transform: Mat4,

    /// Light position (xyz) + far plane (w)
    pub light_position: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointShadowmapPassParams {
    /// View-projection of the cube face being rendered
    pub transform: Mat4,

    /// Light position (xyz) + far plane (w)
    pub light_position: Vec4,

    /// Preset alpha (x) + masks offset (y) + unused (zw)
    pub transparency: Vec4,

    /// Flags (x, see `RasterPassParams::HAS_OPACITY`) + unused (yzw)
    pub flags: UVec4,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VplPassParams {
    /// RSM width (x) + RSM height (y) + grid columns (z) + shuffle (w)
    pub rsm: UVec4,

    /// Light intensity (x) + texel area factor (y) + unused (zw)
    pub light: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct IsmPassParams {
    /// VPL range start (x) + VPL range end (y) + number of points (z) +
    /// number of points coming straight from mesh vertices (w)
    pub vpls: UVec4,

    /// Point stride (x) + flags (y, see `IsmPassParams::*`) + unused (zw)
    pub config: UVec4,

    /// Far plane (x) + unused (yzw)
    pub light: Vec4,
}

impl IsmPassParams {
    pub const SCALE_ISMS: u32 = 1 << 0;
    pub const POINTS_ONLY_INTO_SCALED: u32 = 1 << 1;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PushPullPassParams {
    /// Target level (x) + target level's size (y) + unused (zw)
    pub level: UVec4,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ClusteringPassParams {
    pub view: Mat4,
    pub projection_inverse: Mat4,

    /// Viewport width (x) + height (y) + tiles x (z) + tiles y (w)
    pub viewport: UVec4,

    /// VPL range start (x) + VPL range end (y) + max lights per tile (z) +
    /// unused (w)
    pub vpls: UVec4,

    /// Far plane (x) + VPL clamping value (y) + unused (zw)
    pub light: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FinalGatheringPassParams {
    pub view: Mat4,
    pub view_projection_inverted: Mat4,

    /// Viewport width (x) + height (y) + tiles x (z) + unused (w)
    pub viewport: UVec4,

    /// VPL range start (x) + VPL range end (y) + unused (zw)
    pub vpls: UVec4,

    /// ISM far plane (x) + GI intensity factor (y) + VPL clamping value (z) +
    /// unused (w)
    pub gi: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BlurPassParams {
    pub projection_inverse: Mat4,

    /// Viewport width (x) + height (y) + unused (zw)
    pub viewport: UVec4,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DeferredShadingPassParams {
    pub view_projection_inverted: Mat4,
    pub biased_shadow_transform: Mat4,

    /// Camera eye (xyz) + unused (w)
    pub camera_eye: Vec4,

    /// Light direction (xyz) + light intensity (w)
    pub light_direction: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AccumulationPassParams {
    /// Current frame (x) + unused (yzw)
    pub frame: UVec4,
}

#[cfg(test)]
mod tests {
    use std::mem;

    use super::*;

    #[test]
    fn params_are_16_byte_aligned() {
        let sizes = [
            mem::size_of::<RasterPassParams>(),
            mem::size_of::<ShadowmapPassParams>(),
            mem::size_of::<PointShadowmapPassParams>(),
            mem::size_of::<VplPassParams>(),
            mem::size_of::<IsmPassParams>(),
            mem::size_of::<PushPullPassParams>(),
            mem::size_of::<ClusteringPassParams>(),
            mem::size_of::<FinalGatheringPassParams>(),
            mem::size_of::<BlurPassParams>(),
            mem::size_of::<DeferredShadingPassParams>(),
            mem::size_of::<AccumulationPassParams>(),
        ];

        for size in sizes {
            assert_eq!(0, size % 16, "size={size}");
        }

        assert_eq!(240, mem::size_of::<RasterPassParams>());
    }

    #[test]
    fn raster_flags() {
        let params = RasterPassParams {
            flags: UVec4::new(
                RasterPassParams::HAS_DIFFUSE | RasterPassParams::IS_GROUND,
                0,
                0,
                0,
            ),
            ..Default::default()
        };

        assert!(params.has_flag(RasterPassParams::HAS_DIFFUSE));
        assert!(params.has_flag(RasterPassParams::IS_GROUND));
        assert!(!params.has_flag(RasterPassParams::HAS_BUMP));
    }
}
