//! Scaled dot-product attention primitives for the transformer project.
//!
//! The crate defines a portable API for computing single-head attention over
//! tensors with layout `[batch, seq_len, dim]`. Queries and keys share their
//! inner dimension `d_k`; keys and values share their sequence length. The
//! output tensor has layout `[batch, seq_q, d_v]` and matches the input
//! dtype; reductions run in the precision selected by [`Config`].
//!
//! Masks follow the keep convention: nonzero means "attend", zero means
//! "suppress". The optional mask is the explicit sum type [`MaskSpec`]
//! rather than a nullable argument, and accepted mask shapes are governed by
//! the documented expansion rules in [`masks`] rather than by implicit array
//! broadcasting.
//!
//! All operations are pure: inputs are never mutated and every output is a
//! freshly constructed tensor, so repeated calls with identical inputs
//! produce identical results.

pub mod core;
pub mod masks;
pub mod reference;

pub use crate::core::{
    Attention, AttentionError, BroadcastMode, Config, MaskedRowPolicy, Precision,
};
pub use crate::masks::MaskSpec;
pub use crate::reference::{scaled_dot_product_attention, ScaledDotProduct};
