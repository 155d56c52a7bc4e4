//! Codecs du format propriétaire : conteneur compressé et encodages de pixels

pub mod color;
pub mod compression;
pub mod pixel;

pub use color::*;
pub use compression::*;
pub use pixel::*;
