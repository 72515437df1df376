//! Multi-frame deferred renderer approximating global illumination with
//! reflective shadow maps, virtual point lights and imperfect shadow maps.
//!
//! Each call to [`MultiFramePainter::paint()`] renders a single jittered
//! sub-frame and folds it into a running average; once enough sub-frames
//! have been accumulated, rendering pauses until the camera, viewport,
//! projection or scene changes.

mod backend;
mod buffers;
mod capabilities;
mod config;
mod error;
mod painter;
mod properties;
mod scene;
mod shaders;
mod stages;
mod sun;
mod transparency;
mod utils;

pub use multiframe_gpu as gpu;

pub use self::backend::*;
pub(crate) use self::buffers::*;
pub use self::capabilities::*;
pub use self::config::*;
pub use self::error::*;
pub use self::painter::*;
pub use self::properties::*;
pub use self::scene::*;
pub use self::shaders::*;
pub use self::stages::*;
pub use self::sun::*;
pub use self::transparency::*;
pub use self::utils::ceil_div;
