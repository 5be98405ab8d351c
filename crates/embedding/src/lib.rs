//! Embedding crate
//!
//! Token embeddings are looked up and scaled by `sqrt(d_model)` so their
//! variance matches the fixed sinusoidal positional signal produced by the
//! positional module; neither dominates when the caller sums the two.

pub mod positional;
pub mod token;

pub use positional::*;
pub use token::*;
