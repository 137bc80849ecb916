//! Domain models for registry matching.

mod feed;
mod registry;
mod target;

pub use feed::*;
pub use registry::*;
pub use target::*;
