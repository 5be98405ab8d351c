//! Mask representation and expansion rules shared by attention
//! implementations.
//!
//! Masks use the keep convention: a nonzero entry means the corresponding
//! query/key pair may attend, a zero entry suppresses it. Any numeric dtype
//! is accepted; the engine compares entries against zero in its working
//! precision. Suppressed positions are never removed from the score shape,
//! only overwritten with a large negative sentinel before normalization.

pub mod padding;

use candle_core::Tensor;

use crate::core::{AttentionError, BroadcastMode};

pub use padding::{keep_mask_from_booleans, keep_mask_from_lengths};

/// Optional attention mask, made explicit as a sum type.
///
/// `Absent` means every query/key pair attends. `Present` carries a keep
/// mask whose shape must satisfy [`expand_mask`] for the call's score shape.
#[derive(Debug, Clone)]
pub enum MaskSpec {
    Absent,
    Present(Tensor),
}

impl MaskSpec {
    /// Returns the carried mask tensor, if any.
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            MaskSpec::Absent => None,
            MaskSpec::Present(mask) => Some(mask),
        }
    }
}

impl From<Option<Tensor>> for MaskSpec {
    fn from(mask: Option<Tensor>) -> Self {
        match mask {
            None => MaskSpec::Absent,
            Some(mask) => MaskSpec::Present(mask),
        }
    }
}

/// Expand a keep mask to the score shape `(batch, seq_q, seq_k)`.
///
/// Expansion is an explicit rule set, not implicit array broadcasting:
///
/// * `Strict` requires rank 3. Every axis must equal its target or be
///   exactly 1; size-1 axes are repeated along their target (a
///   `(batch, 1, seq_k)` mask applies to every query row).
/// * `Permissive` additionally accepts rank-2 `(seq_q, seq_k)` and rank-1
///   `(seq_k)` masks. Missing leading axes are implied to have size 1 and
///   then follow the strict rules. Implied axes are never read as the batch
///   size; a per-batch mask must be supplied as rank 3.
///
/// Any other shape fails with [`AttentionError::ShapeMismatch`] naming the
/// offending axis.
pub fn expand_mask(
    mask: &Tensor,
    batch: usize,
    seq_q: usize,
    seq_k: usize,
    mode: BroadcastMode,
) -> Result<Tensor, AttentionError> {
    let dims = mask.dims().to_vec();
    let rank3 = match (dims.as_slice(), mode) {
        ([_, _, _], _) => mask.clone(),
        ([d0, d1], BroadcastMode::Permissive) => mask
            .reshape((1, *d0, *d1))
            .map_err(AttentionError::backend)?,
        ([d0], BroadcastMode::Permissive) => mask
            .reshape((1, 1, *d0))
            .map_err(AttentionError::backend)?,
        _ => {
            return Err(AttentionError::ShapeMismatch {
                context: format!(
                    "mask rank {} is not accepted in {:?} mode (shape {:?}, target [{batch}, {seq_q}, {seq_k}])",
                    dims.len(),
                    mode,
                    dims
                ),
            })
        }
    };

    let (mb, mq, mk) = rank3.dims3().map_err(AttentionError::backend)?;
    for (axis, actual, target) in [
        ("batch", mb, batch),
        ("seq_q", mq, seq_q),
        ("seq_k", mk, seq_k),
    ] {
        if actual != target && actual != 1 {
            return Err(AttentionError::ShapeMismatch {
                context: format!(
                    "mask {axis} axis is {actual}, expected {target} or 1 (mask {:?}, target [{batch}, {seq_q}, {seq_k}])",
                    dims
                ),
            });
        }
    }

    // Materialize the expansion so the result owns its storage.
    rank3
        .broadcast_as((batch, seq_q, seq_k))
        .and_then(|expanded| expanded.contiguous())
        .map_err(AttentionError::backend)
}
