//! Configuration options shared by all attention implementations.
//!
//! The [`Config`] struct captures run-time knobs such as reduction precision
//! and mask handling that callers can tune without swapping implementations.

/// Floating-point width used for score and weight reductions.
///
/// Inputs are cast to this dtype before the first matrix product and the
/// final context tensor is cast back to the input dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// 32-bit reductions (default).
    F32,
    /// 64-bit reductions.
    F64,
}

/// Governs which mask shapes are accepted by the expansion step.
///
/// The exact rule set lives with [`crate::masks::expand_mask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastMode {
    /// Mask must be rank 3 with every axis equal to its target or exactly 1.
    Strict,
    /// Additionally accepts rank-2 `(seq_q, seq_k)` and rank-1 `(seq_k)`
    /// masks, which gain implied leading size-1 axes.
    Permissive,
}

/// Behaviour for weight rows whose mask suppresses every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskedRowPolicy {
    /// Leave the row as the softmax of equal sentinels: a near-uniform
    /// distribution over all keys. Matches the reference behaviour of
    /// masking with a large finite negative constant.
    Uniform,
    /// Zero the weight row, so the corresponding context row is zero.
    Zero,
}

/// Configuration driving attention behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Precision for internal reductions.
    pub precision: Precision,
    /// Mask shape acceptance mode.
    pub broadcast: BroadcastMode,
    /// Policy for fully-masked weight rows.
    pub masked_rows: MaskedRowPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            precision: Precision::F32,
            broadcast: BroadcastMode::Strict,
            masked_rows: MaskedRowPolicy::Uniform,
        }
    }
}

impl Config {
    /// Working dtype implied by [`Config::precision`].
    pub fn working_dtype(&self) -> candle_core::DType {
        match self.precision {
            Precision::F32 => candle_core::DType::F32,
            Precision::F64 => candle_core::DType::F64,
        }
    }
}
