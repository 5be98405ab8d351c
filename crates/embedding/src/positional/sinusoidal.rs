//! Sinusoidal positional encoding table.

use candle_core::{bail, DType, Device, Result, Tensor};

/// Generate the fixed sinusoidal positional table, shaped
/// `(seq_length, d_model)`.
///
/// For position `p` and dimension-pair index `i`, the pair frequency is
/// `exp(-ln(10000) * 2i / d_model)`; column `2i` holds `sin(p * f(i))` and
/// column `2i + 1` holds `cos(p * f(i))`. When `d_model` is odd the final
/// cosine column is omitted. Every entry lies in `[-1, 1]` and the table is
/// fully deterministic.
///
/// The table is computed in `f64` and cast to the requested dtype.
pub fn sinusoidal_table(
    seq_length: usize,
    d_model: usize,
    dtype: DType,
    device: &Device,
) -> Result<Tensor> {
    if seq_length == 0 {
        bail!("positional encoding requires seq_length > 0");
    }
    if d_model == 0 {
        bail!("positional encoding requires d_model > 0");
    }

    let ln_base = 10000f64.ln();
    let mut data = vec![0f64; seq_length * d_model];
    for p in 0..seq_length {
        let row = p * d_model;
        for i in 0..d_model.div_ceil(2) {
            let freq = (-(ln_base) * (2 * i) as f64 / d_model as f64).exp();
            let angle = p as f64 * freq;
            data[row + 2 * i] = angle.sin();
            if 2 * i + 1 < d_model {
                data[row + 2 * i + 1] = angle.cos();
            }
        }
    }

    Tensor::from_vec(data, (seq_length, d_model), device)?.to_dtype(dtype)
}

/// Add a positional table to a batch of embeddings.
///
/// `embeddings` must be shaped `(batch, seq, d_model)` and `table`
/// `(table_seq, d_model)` with `table_seq >= seq`; the first `seq` rows are
/// broadcast over the batch axis. Returns a new tensor, leaving both inputs
/// untouched.
pub fn add_positional(embeddings: &Tensor, table: &Tensor) -> Result<Tensor> {
    let (_batch, seq, d_model) = embeddings.dims3().map_err(|_| {
        candle_core::Error::Msg(format!(
            "embeddings must be shaped [batch, seq, d_model], got {:?}",
            embeddings.dims()
        ))
    })?;
    let (table_seq, table_dim) = table.dims2().map_err(|_| {
        candle_core::Error::Msg(format!(
            "positional table must be shaped [seq, d_model], got {:?}",
            table.dims()
        ))
    })?;

    if table_dim != d_model {
        bail!(
            "positional table dimension {table_dim} does not match embedding dimension {d_model}"
        );
    }
    if table_seq < seq {
        bail!("positional table covers {table_seq} positions but the input has {seq}");
    }

    let rows = table.narrow(0, 0, seq)?.to_dtype(embeddings.dtype())?;
    embeddings.broadcast_add(&rows.unsqueeze(0)?)
}
