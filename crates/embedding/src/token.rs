//! Token embedding table with scaled lookup.

use candle_core::{bail, DType, Device, Error, Result, Tensor, Var};

/// Configuration for building a token embedding table.
#[derive(Debug, Clone)]
pub struct TokenEmbeddingConfig {
    /// Size of the vocabulary (number of distinct tokens).
    pub vocab_size: usize,
    /// Dimensionality of each embedding vector.
    pub d_model: usize,
    /// Storage dtype used for the underlying parameters and outputs.
    pub dtype: DType,
    /// Device hosting the parameters.
    pub device: Device,
}

/// Learnable token embedding table.
///
/// Rows are initialised from `N(0, 1/sqrt(d_model))` and lookups are scaled
/// by `sqrt(d_model)`, matching the Transformer convention for balancing
/// the embedding against an additive positional encoding.
#[derive(Debug, Clone)]
pub struct TokenEmbedding {
    config: TokenEmbeddingConfig,
    weight: Var,
}

impl TokenEmbedding {
    /// Builds a new token embedding table.
    pub fn new(config: TokenEmbeddingConfig) -> Result<Self> {
        if config.vocab_size == 0 {
            bail!("token embedding requires vocab_size > 0");
        }
        if config.d_model == 0 {
            bail!("token embedding requires d_model > 0");
        }

        let std = (1.0 / (config.d_model as f64).sqrt()) as f32;
        let shape = (config.vocab_size, config.d_model);
        let initial = Var::randn(0f32, std, shape, &config.device)?;
        let weight = if initial.dtype() == config.dtype {
            initial
        } else {
            let cast = initial.as_tensor().to_dtype(config.dtype)?;
            Var::from_tensor(&cast)?
        };

        Ok(Self { config, weight })
    }

    /// Returns the embedding configuration.
    pub fn config(&self) -> &TokenEmbeddingConfig {
        &self.config
    }

    /// Returns a clone of the underlying weight tensor.
    pub fn weight(&self) -> Tensor {
        self.weight.as_tensor().clone()
    }

    /// Looks up embeddings for the provided token ids and scales them by
    /// `sqrt(d_model)`.
    ///
    /// Inputs must be shaped `(batch, seq)` with an integer dtype. Outputs
    /// follow the `(batch, seq, d_model)` layout using the configured
    /// storage dtype.
    pub fn forward(&self, token_ids: &Tensor) -> Result<Tensor> {
        self.validate_token_ids(token_ids)?;
        let dims = token_ids.dims();

        let ids = token_ids.to_dtype(DType::I64)?;
        let flat = ids.flatten_all()?;
        self.ensure_id_range(&flat)?;

        let weight = self.weight.as_tensor();
        let gathered = weight.index_select(&flat, 0)?;
        let mut output_dims = dims.to_vec();
        output_dims.push(self.config.d_model);
        let embedded = gathered.reshape(output_dims)?;

        let scale = (self.config.d_model as f64).sqrt();
        embedded.affine(scale, 0.0)
    }

    fn validate_token_ids(&self, token_ids: &Tensor) -> Result<()> {
        let dims = token_ids.dims();
        match dims {
            [batch, seq] => {
                if *batch == 0 || *seq == 0 {
                    return Err(Error::Msg(
                        "token_ids must have non-zero batch and seq dimensions".into(),
                    ));
                }
            }
            _ => return Err(Error::Msg("token_ids must be shaped [batch, seq]".into())),
        }

        if !token_ids.dtype().is_int() {
            Err(Error::Msg(format!(
                "token_ids expected integer dtype but received {:?}",
                token_ids.dtype()
            )))
        } else {
            Ok(())
        }
    }

    fn ensure_id_range(&self, flat_ids: &Tensor) -> Result<()> {
        if flat_ids.elem_count() == 0 {
            return Ok(());
        }

        let min_id = flat_ids.min_all()?.to_scalar::<i64>()?;
        if min_id < 0 {
            return Err(Error::Msg(format!(
                "encountered negative token id {} (minimum)",
                min_id
            )));
        }

        let max_id = flat_ids.max_all()?.to_scalar::<i64>()?;
        let vocab = self.config.vocab_size as i64;
        if max_id >= vocab {
            return Err(Error::Msg(format!(
                "token id {} exceeds vocab size {}",
                max_id, vocab
            )));
        }
        Ok(())
    }
}
