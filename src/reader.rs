//! Line extraction through per-worker read contexts.
//!
//! - [`context`] - the read context, bounded extraction and context derivation
//! - [`adaptive`] - prefix reads driven by a bytes-per-char estimate
//! - `overflow` - the path for lines larger than the scratch buffers

pub mod adaptive;
pub mod context;
mod overflow;

pub use adaptive::ReadAheadEstimator;
pub use context::ReadContext;
