mod library;
mod macros;
mod variants;

pub use self::library::*;
pub use self::macros::*;
pub use self::variants::*;
