//! HTTP adapters for the DIN match pipeline.
//!
//! This crate provides the concrete network sources behind the core seams:
//! [`DpdFeedClient`] for the three registry feeds and [`SecondaryCodeClient`]
//! for the per-identifier secondary-code lookup. Both are blocking; each
//! invocation of the pipeline is a single short-lived batch.

pub mod config;
#[cfg(feature = "http")]
pub mod dpd;
#[cfg(feature = "http")]
pub mod lookup;

pub use config::*;
#[cfg(feature = "http")]
pub use dpd::*;
#[cfg(feature = "http")]
pub use lookup::*;
