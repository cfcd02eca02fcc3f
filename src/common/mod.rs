pub mod bitstream;
pub mod codec;
pub mod error;
pub mod iter;
pub mod mask;
pub mod metadata;

pub use bitstream::*;
pub use error::*;
pub use metadata::*;
