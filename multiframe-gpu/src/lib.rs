//! Data layouts shared between the painter and its WGSL shaders.
//!
//! Everything here is `#[repr(C)]` + [`bytemuck::Pod`] and built only out of
//! 16-byte-aligned members, so that the structs can be copied verbatim into
//! uniform and storage buffers.

mod passes;
mod vertex;
mod vpl;

pub use self::passes::*;
pub use self::vertex::*;
pub use self::vpl::*;

/// Number of virtual point lights extracted from the reflective shadow map.
pub const VPL_COUNT: usize = 1024;

/// Side of the imperfect shadowmap atlas, in texels.
pub const ISM_ATLAS_SIZE: u32 = 2048;

/// Side of a single VPL's cell inside the imperfect shadowmap atlas.
pub const ISM_CELL_SIZE: u32 = 64;

/// Number of cells per atlas row; `ISM_CELLS_PER_ROW^2 == VPL_COUNT`.
pub const ISM_CELLS_PER_ROW: u32 = ISM_ATLAS_SIZE / ISM_CELL_SIZE;

/// Number of mip levels used by the push-pull reconstruction, down to one
/// texel per cell.
pub const ISM_PUSH_PULL_LEVELS: u32 = ISM_CELL_SIZE.trailing_zeros() + 1;

/// Side of a light-clustering tile, in pixels.
pub const CLUSTER_TILE_SIZE: u32 = 32;

/// Maximum number of VPL indices stored for a single tile.
pub const MAX_LIGHTS_PER_TILE: u32 = 256;

/// Side of the final gathering's compute workgroup.
pub const FINAL_GATHERING_WORKGROUP_SIZE: u32 = 8;

/// Size of the interleaved-sampling pattern used by the final gathering.
pub const FINAL_GATHERING_INTERLEAVE: u32 = 4;
