//! Error types emitted by attention implementations.

/// Attention-specific error category.
///
/// Shape and argument errors are raised eagerly, before any computation
/// begins; once one is returned no partial result exists.
#[derive(Debug)]
pub enum AttentionError {
    /// The supplied tensor shapes do not align with the documented contract.
    /// The message names the conflicting dimensions.
    ShapeMismatch { context: String },
    /// A size or value precondition was violated (e.g. a zero-sized axis).
    InvalidArgument { context: String },
    /// Normalization produced a non-finite weight. The stability step makes
    /// this unreachable for finite inputs; it is reported rather than
    /// silently returned as NaN.
    NumericOverflow { context: String },
    /// A backend-specific failure propagated to the caller.
    Backend { message: String },
}

impl AttentionError {
    pub(crate) fn backend(err: candle_core::Error) -> Self {
        AttentionError::Backend {
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for AttentionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttentionError::ShapeMismatch { context } => {
                write!(f, "shape mismatch: {context}")
            }
            AttentionError::InvalidArgument { context } => {
                write!(f, "invalid argument: {context}")
            }
            AttentionError::NumericOverflow { context } => {
                write!(f, "numeric overflow: {context}")
            }
            AttentionError::Backend { message } => f.write_str(message),
        }
    }
}

impl std::error::Error for AttentionError {}
