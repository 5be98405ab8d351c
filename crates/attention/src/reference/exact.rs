use std::sync::OnceLock;

use candle_core::{DType, Tensor, D};
use candle_nn::ops::softmax_last_dim;

use crate::core::{Attention, AttentionError, Config, MaskedRowPolicy};
use crate::masks::{expand_mask, MaskSpec};

/// Finite stand-in for negative infinity written over suppressed scores.
///
/// Kept finite so that a row whose keys are all suppressed still normalizes
/// to a well-defined (near-uniform) distribution instead of NaN.
pub const SUPPRESS_SENTINEL: f64 = -1e9;

/// Numerically stable scaled dot-product attention kernel.
///
/// Pure and stateless apart from a one-shot init log guard; the same inputs
/// always produce the same output.
#[derive(Debug, Default)]
pub struct ScaledDotProduct {
    first_call: OnceLock<()>,
}

impl ScaledDotProduct {
    pub fn new() -> Self {
        Self {
            first_call: OnceLock::new(),
        }
    }

    /// Compute attention and also return the normalized weight matrix.
    ///
    /// The context tensor is shaped `(batch, seq_q, d_v)` and the weights
    /// `(batch, seq_q, seq_k)`; both carry the dtype of `q`. Each weight row
    /// sums to 1 unless the row is fully masked under
    /// [`MaskedRowPolicy::Zero`], in which case it is all zeros.
    pub fn attend_with_weights(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        mask: &MaskSpec,
        config: &Config,
    ) -> Result<(Tensor, Tensor), AttentionError> {
        if self.first_call.set(()).is_ok() {
            log::info!(
                "attention::reference init precision={:?} broadcast={:?} masked_rows={:?}",
                config.precision,
                config.broadcast,
                config.masked_rows
            );
        }

        let device = q.device();
        if !device.same_device(k.device()) || !device.same_device(v.device()) {
            return Err(AttentionError::InvalidArgument {
                context: "q, k, v must reside on the same device".to_string(),
            });
        }

        let dtype = q.dtype();
        if dtype != k.dtype() || dtype != v.dtype() {
            return Err(AttentionError::InvalidArgument {
                context: format!(
                    "q, k, v must share the same dtype, got {:?}, {:?}, {:?}",
                    q.dtype(),
                    k.dtype(),
                    v.dtype()
                ),
            });
        }
        if !matches!(dtype, DType::F32 | DType::F64) {
            return Err(AttentionError::InvalidArgument {
                context: format!("inputs must be f32 or f64, got {dtype:?}"),
            });
        }

        let (batch, seq_q, d_k) = q.dims3().map_err(|_| AttentionError::ShapeMismatch {
            context: format!("q must have shape [batch, seq_q, d_k], got {:?}", q.dims()),
        })?;
        let (kb, seq_k, kd) = k.dims3().map_err(|_| AttentionError::ShapeMismatch {
            context: format!("k must have shape [batch, seq_k, d_k], got {:?}", k.dims()),
        })?;
        let (vb, vk, d_v) = v.dims3().map_err(|_| AttentionError::ShapeMismatch {
            context: format!("v must have shape [batch, seq_k, d_v], got {:?}", v.dims()),
        })?;

        for (name, dim) in [
            ("batch", batch),
            ("seq_q", seq_q),
            ("d_k", d_k),
            ("seq_k", seq_k),
            ("d_v", d_v),
        ] {
            if dim == 0 {
                return Err(AttentionError::InvalidArgument {
                    context: format!("{name} must be positive, got 0"),
                });
            }
        }

        if kb != batch || vb != batch {
            return Err(AttentionError::ShapeMismatch {
                context: format!(
                    "batch axes disagree: q has {batch}, k has {kb}, v has {vb}"
                ),
            });
        }
        if kd != d_k {
            return Err(AttentionError::ShapeMismatch {
                context: format!(
                    "query inner dimension {d_k} does not match key inner dimension {kd}"
                ),
            });
        }
        if vk != seq_k {
            return Err(AttentionError::ShapeMismatch {
                context: format!(
                    "key sequence length {seq_k} does not match value sequence length {vk}"
                ),
            });
        }

        // Validate the mask shape eagerly, before any compute.
        let keep = match mask {
            MaskSpec::Absent => None,
            MaskSpec::Present(raw) => {
                if !device.same_device(raw.device()) {
                    return Err(AttentionError::InvalidArgument {
                        context: "mask must reside on the same device as q".to_string(),
                    });
                }
                Some(expand_mask(raw, batch, seq_q, seq_k, config.broadcast)?)
            }
        };

        let working = config.working_dtype();
        let q_work = q.to_dtype(working).map_err(AttentionError::backend)?;
        let k_work = k.to_dtype(working).map_err(AttentionError::backend)?;
        let v_work = v.to_dtype(working).map_err(AttentionError::backend)?;

        let k_t = k_work.transpose(1, 2).map_err(AttentionError::backend)?;
        let scores = q_work.matmul(&k_t).map_err(AttentionError::backend)?;
        let scale = 1.0 / (d_k as f64).sqrt();
        let scores = scores.affine(scale, 0.0).map_err(AttentionError::backend)?;

        let (scores, keep) = match keep {
            None => (scores, None),
            Some(keep) => {
                let attend = keep
                    .to_dtype(working)
                    .and_then(|k| k.ne(0.0))
                    .map_err(AttentionError::backend)?;
                let sentinel = scores
                    .zeros_like()
                    .and_then(|z| z.affine(1.0, SUPPRESS_SENTINEL))
                    .map_err(AttentionError::backend)?;
                let masked = attend
                    .where_cond(&scores, &sentinel)
                    .map_err(AttentionError::backend)?;
                // 0/1 indicator in working precision, for the row policy.
                let keep01 = attend.to_dtype(working).map_err(AttentionError::backend)?;
                (masked, Some(keep01))
            }
        };

        // softmax_last_dim subtracts each row's maximum before
        // exponentiating, which keeps the sentinel rows finite.
        let weights = softmax_last_dim(&scores).map_err(AttentionError::backend)?;

        let total = weights
            .sum_all()
            .and_then(|t| t.to_dtype(DType::F64))
            .and_then(|t| t.to_scalar::<f64>())
            .map_err(AttentionError::backend)?;
        if !total.is_finite() {
            return Err(AttentionError::NumericOverflow {
                context: "softmax produced non-finite attention weights".to_string(),
            });
        }

        let weights = match (config.masked_rows, keep) {
            (MaskedRowPolicy::Zero, Some(keep)) => {
                // Rows with no unmasked key get a zero multiplier.
                let row_any = keep
                    .max_keepdim(D::Minus1)
                    .map_err(AttentionError::backend)?;
                weights
                    .broadcast_mul(&row_any)
                    .map_err(AttentionError::backend)?
            }
            _ => weights,
        };

        let context = weights.matmul(&v_work).map_err(AttentionError::backend)?;
        let context = context.to_dtype(dtype).map_err(AttentionError::backend)?;
        let weights = weights.to_dtype(dtype).map_err(AttentionError::backend)?;
        Ok((context, weights))
    }
}

impl Attention for ScaledDotProduct {
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        mask: &MaskSpec,
        config: &Config,
    ) -> Result<Tensor, AttentionError> {
        let (context, _weights) = self.attend_with_weights(q, k, v, mask, config)?;
        Ok(context)
    }
}

/// Compute scaled dot-product attention with the default configuration.
pub fn scaled_dot_product_attention(
    q: &Tensor,
    k: &Tensor,
    v: &Tensor,
    mask: &MaskSpec,
) -> Result<Tensor, AttentionError> {
    ScaledDotProduct::new().attend(q, k, v, mask, &Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BroadcastMode, Precision};
    use candle_core::{Device, Result as CandleResult};

    fn build_inputs(device: &Device) -> CandleResult<(Tensor, Tensor, Tensor)> {
        let data: Vec<f32> = (0..24).map(|i| (i as f32) * 0.1 - 1.0).collect();
        let q = Tensor::from_vec(data.clone(), (2, 3, 4), device)?;
        let k = Tensor::from_vec(data.clone(), (2, 3, 4), device)?;
        let v = Tensor::from_vec(data, (2, 3, 4), device)?;
        Ok((q, k, v))
    }

    fn naive_attention(
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        keep: Option<&[f32]>,
    ) -> CandleResult<Vec<f32>> {
        let (batch, seq_q, d_k) = q.dims3()?;
        let (_, seq_k, d_v) = v.dims3()?;
        let q_vec = q.flatten_all()?.to_vec1::<f32>()?;
        let k_vec = k.flatten_all()?.to_vec1::<f32>()?;
        let v_vec = v.flatten_all()?.to_vec1::<f32>()?;

        let mut output = vec![0f32; batch * seq_q * d_v];
        for b in 0..batch {
            for qi in 0..seq_q {
                let mut scores = vec![0f32; seq_k];
                for ki in 0..seq_k {
                    let mut dot = 0f32;
                    for d in 0..d_k {
                        dot += q_vec[(b * seq_q + qi) * d_k + d] * k_vec[(b * seq_k + ki) * d_k + d];
                    }
                    scores[ki] = dot / (d_k as f32).sqrt();
                    if let Some(keep) = keep {
                        if keep[(b * seq_q + qi) * seq_k + ki] == 0.0 {
                            scores[ki] = SUPPRESS_SENTINEL as f32;
                        }
                    }
                }
                let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                let exp: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
                let sum: f32 = exp.iter().sum();
                for d in 0..d_v {
                    let mut acc = 0f32;
                    for ki in 0..seq_k {
                        acc += exp[ki] / sum * v_vec[(b * seq_k + ki) * d_v + d];
                    }
                    output[(b * seq_q + qi) * d_v + d] = acc;
                }
            }
        }
        Ok(output)
    }

    fn assert_close(actual: &[f32], expected: &[f32], tolerance: f32) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
            assert!(
                (a - e).abs() <= tolerance,
                "index {i}: {a} vs {e} exceeds tolerance {tolerance}"
            );
        }
    }

    #[test]
    fn matches_naive_computation() -> CandleResult<()> {
        let device = Device::Cpu;
        let (q, k, v) = build_inputs(&device)?;

        let engine = ScaledDotProduct::new();
        let context = engine
            .attend(&q, &k, &v, &MaskSpec::Absent, &Config::default())
            .unwrap();
        let expected = naive_attention(&q, &k, &v, None)?;

        assert_close(
            &context.flatten_all()?.to_vec1::<f32>()?,
            &expected,
            1e-5,
        );
        Ok(())
    }

    #[test]
    fn matches_naive_computation_with_mask() -> CandleResult<()> {
        let device = Device::Cpu;
        let (q, k, v) = build_inputs(&device)?;
        let keep: Vec<f32> = (0..18).map(|i| if i % 3 == 0 { 0.0 } else { 1.0 }).collect();
        let mask = Tensor::from_vec(keep.clone(), (2, 3, 3), &device)?;

        let engine = ScaledDotProduct::new();
        let context = engine
            .attend(&q, &k, &v, &MaskSpec::Present(mask), &Config::default())
            .unwrap();
        let expected = naive_attention(&q, &k, &v, Some(&keep))?;

        assert_close(
            &context.flatten_all()?.to_vec1::<f32>()?,
            &expected,
            1e-5,
        );
        Ok(())
    }

    #[test]
    fn any_nonzero_mask_value_means_attend() -> CandleResult<()> {
        let device = Device::Cpu;
        let (q, k, v) = build_inputs(&device)?;
        let keep: Vec<f32> = (0..18).map(|i| if i % 3 == 0 { 0.0 } else { 1.0 }).collect();
        let scaled: Vec<f32> = keep.iter().map(|value| value * 7.5).collect();

        let engine = ScaledDotProduct::new();
        let cfg = Config {
            masked_rows: MaskedRowPolicy::Zero,
            ..Config::default()
        };
        let unit = engine
            .attend(
                &q,
                &k,
                &v,
                &MaskSpec::Present(Tensor::from_vec(keep, (2, 3, 3), &device)?),
                &cfg,
            )
            .unwrap();
        let wide = engine
            .attend(
                &q,
                &k,
                &v,
                &MaskSpec::Present(Tensor::from_vec(scaled, (2, 3, 3), &device)?),
                &cfg,
            )
            .unwrap();

        assert_close(
            &wide.flatten_all()?.to_vec1::<f32>()?,
            &unit.flatten_all()?.to_vec1::<f32>()?,
            1e-6,
        );
        Ok(())
    }

    #[test]
    fn f64_reductions_stay_close_to_f32() -> CandleResult<()> {
        let device = Device::Cpu;
        let (q, k, v) = build_inputs(&device)?;

        let engine = ScaledDotProduct::new();
        let cfg64 = Config {
            precision: Precision::F64,
            ..Config::default()
        };
        let wide = engine
            .attend(&q, &k, &v, &MaskSpec::Absent, &cfg64)
            .unwrap();
        let narrow = engine
            .attend(&q, &k, &v, &MaskSpec::Absent, &Config::default())
            .unwrap();

        assert_eq!(wide.dtype(), DType::F32);
        assert_close(
            &wide.flatten_all()?.to_vec1::<f32>()?,
            &narrow.flatten_all()?.to_vec1::<f32>()?,
            1e-5,
        );
        Ok(())
    }

    #[test]
    fn mismatched_inner_dims_are_rejected_with_both_values() -> CandleResult<()> {
        let device = Device::Cpu;
        let q = Tensor::zeros((1, 2, 4), DType::F32, &device)?;
        let k = Tensor::zeros((1, 2, 5), DType::F32, &device)?;
        let v = Tensor::zeros((1, 2, 3), DType::F32, &device)?;

        let err = ScaledDotProduct::new()
            .attend(&q, &k, &v, &MaskSpec::Absent, &Config::default())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("query inner dimension 4"));
        assert!(message.contains("key inner dimension 5"));
        Ok(())
    }

    #[test]
    fn mismatched_key_value_lengths_are_rejected() -> CandleResult<()> {
        let device = Device::Cpu;
        let q = Tensor::zeros((1, 2, 4), DType::F32, &device)?;
        let k = Tensor::zeros((1, 3, 4), DType::F32, &device)?;
        let v = Tensor::zeros((1, 2, 4), DType::F32, &device)?;

        let err = ScaledDotProduct::new()
            .attend(&q, &k, &v, &MaskSpec::Absent, &Config::default())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("key sequence length 3"));
        assert!(message.contains("value sequence length 2"));
        Ok(())
    }

    #[test]
    fn zero_sized_axis_is_an_invalid_argument() -> CandleResult<()> {
        let device = Device::Cpu;
        let q = Tensor::zeros((1, 0, 4), DType::F32, &device)?;
        let k = Tensor::zeros((1, 2, 4), DType::F32, &device)?;
        let v = Tensor::zeros((1, 2, 4), DType::F32, &device)?;

        let err = ScaledDotProduct::new()
            .attend(&q, &k, &v, &MaskSpec::Absent, &Config::default())
            .unwrap_err();
        assert!(matches!(err, AttentionError::InvalidArgument { .. }));
        assert!(err.to_string().contains("seq_q must be positive"));
        Ok(())
    }

    #[test]
    fn fully_masked_row_is_uniform_by_default() -> CandleResult<()> {
        let device = Device::Cpu;
        let (q, k, v) = build_inputs(&device)?;
        // Suppress every key for every query in batch 0.
        let mut keep = vec![1f32; 18];
        for value in keep.iter_mut().take(9) {
            *value = 0.0;
        }
        let mask = Tensor::from_vec(keep, (2, 3, 3), &device)?;

        let engine = ScaledDotProduct::new();
        let (_, weights) = engine
            .attend_with_weights(&q, &k, &v, &MaskSpec::Present(mask), &Config::default())
            .unwrap();
        let weights = weights.flatten_all()?.to_vec1::<f32>()?;
        for &w in &weights[..9] {
            assert!((w - 1.0 / 3.0).abs() < 1e-6, "expected uniform weight, got {w}");
        }
        Ok(())
    }

    #[test]
    fn fully_masked_row_can_zero_the_output() -> CandleResult<()> {
        let device = Device::Cpu;
        let (q, k, v) = build_inputs(&device)?;
        let mut keep = vec![1f32; 18];
        for value in keep.iter_mut().take(9) {
            *value = 0.0;
        }
        let mask = Tensor::from_vec(keep, (2, 3, 3), &device)?;

        let cfg = Config {
            masked_rows: MaskedRowPolicy::Zero,
            broadcast: BroadcastMode::Strict,
            ..Config::default()
        };
        let engine = ScaledDotProduct::new();
        let (context, weights) = engine
            .attend_with_weights(&q, &k, &v, &MaskSpec::Present(mask), &cfg)
            .unwrap();

        let weights = weights.flatten_all()?.to_vec1::<f32>()?;
        for &w in &weights[..9] {
            assert_eq!(w, 0.0);
        }
        let context = context.flatten_all()?.to_vec1::<f32>()?;
        for &c in &context[..12] {
            assert_eq!(c, 0.0);
        }
        // Batch 1 is untouched by the policy.
        let expected = naive_attention(&q, &k, &v, None)?;
        assert_close(&context[12..], &expected[12..], 1e-5);
        Ok(())
    }
}
