//! Fixed positional encodings.
//!
//! The sinusoidal module produces the non-learned sine/cosine table added
//! to token embeddings to inject sequence-order information.

pub mod sinusoidal;

pub use sinusoidal::{add_positional, sinusoidal_table};
