mod mapped_storage_buffer;
mod storage_buffer;
mod texture;

pub use self::mapped_storage_buffer::*;
pub use self::storage_buffer::*;
pub use self::texture::*;
