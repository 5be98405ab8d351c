//! Builders for keep masks that drop padded keys.
//!
//! The resulting tensors have dtype `f32` and shape `(batch, 1, seq_k)`:
//! entries are `1.0` where attention is permitted and `0.0` where the key is
//! padding. The size-1 query axis expands to every query row under the
//! rules in [`super::expand_mask`].

use candle_core::{Device, Result, Tensor};

/// Construct keep masks from per-batch valid key lengths.
///
/// Keys at index `>= valid` are suppressed. Lengths larger than `seq_k` are
/// clamped.
pub fn keep_mask_from_lengths(
    device: &Device,
    key_lengths: &[usize],
    seq_k: usize,
) -> Result<Tensor> {
    let batch = key_lengths.len();
    let mut data = vec![1f32; batch * seq_k];

    for (b, &valid) in key_lengths.iter().enumerate() {
        let valid = valid.min(seq_k);
        for k in valid..seq_k {
            data[b * seq_k + k] = 0.0;
        }
    }

    Tensor::from_vec(data, (batch, 1, seq_k), device)
}

/// Construct keep masks from boolean padding indicators.
///
/// Each inner slice corresponds to a batch element and must share the same
/// length. `true` indicates a padded (suppressed) key position.
pub fn keep_mask_from_booleans(device: &Device, padding: &[Vec<bool>]) -> Result<Tensor> {
    if padding.is_empty() {
        return Tensor::zeros((0, 1, 0), candle_core::DType::F32, device);
    }

    let seq_k = padding[0].len();
    for flags in padding.iter() {
        assert_eq!(flags.len(), seq_k, "all boolean padding masks must share seq_k");
    }

    let batch = padding.len();
    let mut data = vec![1f32; batch * seq_k];

    for (b, flags) in padding.iter().enumerate() {
        for (k, &is_padding) in flags.iter().enumerate() {
            if is_padding {
                data[b * seq_k + k] = 0.0;
            }
        }
    }

    Tensor::from_vec(data, (batch, 1, seq_k), device)
}
