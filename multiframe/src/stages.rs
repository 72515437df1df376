mod clustered_shading;
mod deferred_shading;
mod frame_accumulation;
mod gi;
mod imperfect_shadowmap;
mod omnidirectional_shadowmap;
mod rasterization;
mod shadowmap;
mod vpl_processor;

pub use self::clustered_shading::*;
pub use self::deferred_shading::*;
pub use self::frame_accumulation::*;
pub use self::gi::*;
pub use self::imperfect_shadowmap::*;
pub use self::omnidirectional_shadowmap::*;
pub use self::rasterization::*;
pub use self::shadowmap::*;
pub use self::vpl_processor::*;
