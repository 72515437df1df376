mod math;
mod metrics;

pub use self::math::*;
pub use self::metrics::*;
