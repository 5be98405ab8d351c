//! Reference attention kernels.
//!
//! The exact path prioritises numerical fidelity and mirrors the semantics
//! described by the [`Attention`](crate::core::Attention) trait.

mod exact;

pub use exact::{scaled_dot_product_attention, ScaledDotProduct};
