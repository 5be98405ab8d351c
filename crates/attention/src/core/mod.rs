//! Core traits and types shared across attention implementations.
//!
//! Implementations operate on tensors with layout `[batch, seq_len, dim]`.
//! The output tensor mirrors the batch and query-sequence axes of `q` and
//! the value dimension of `v`, and reductions accumulate in the precision
//! selected by [`Config::precision`] regardless of the incoming dtype.

pub mod config;
pub mod errors;

use candle_core::Tensor;

use crate::masks::MaskSpec;

pub use config::{BroadcastMode, Config, MaskedRowPolicy, Precision};
pub use errors::AttentionError;

/// Unified interface for attention kernels.
///
/// * `q` is shaped `[batch, seq_q, d_k]`, `k` is `[batch, seq_k, d_k]`, and
///   `v` is `[batch, seq_k, d_v]`.
/// * The returned tensor is shaped `[batch, seq_q, d_v]` and carries the
///   dtype of `q`.
/// * Masks use the keep convention (nonzero = attend); accepted shapes are
///   documented in [`crate::masks::expand_mask`].
/// * Inputs are never mutated; every call constructs a fresh output.
pub trait Attention {
    /// Compute attention over `q`, `k`, and `v` with an optional keep mask.
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        mask: &MaskSpec,
        config: &Config,
    ) -> Result<Tensor, AttentionError>;
}
