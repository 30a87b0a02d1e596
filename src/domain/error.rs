use thiserror::Error;

/// Errors raised by the melody pipeline below the application layer.
///
/// The use cases wrap these in `anyhow` with extra context; tests match on
/// the variants directly.
#[derive(Error, Debug)]
pub enum MelodyError {
    /// A token string is not of the form `<PITCH><OCTAVE>-<DURATION>`.
    #[error("malformed token {token:?}: {reason}")]
    Parse { token: String, reason: String },

    /// A well-formed token that the vocabulary has never seen.
    #[error("token {0:?} is not in the vocabulary")]
    UnknownToken(String),

    /// A token id outside `0..vocabulary.len()`.
    #[error("token id {0} is outside the vocabulary")]
    InvalidId(u32),

    /// Inconsistent hyperparameters, detected when a component is built.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Caller supplied input the operation cannot work with.
    #[error("invalid input: {0}")]
    Input(String),

    #[error("sequence of length {len} exceeds the {max} positions covered by the positional encoding")]
    SequenceTooLong { len: usize, max: usize },

    /// Every label in the batch is padding, so the mean loss is undefined.
    #[error("batch has no non-padding target positions")]
    DegenerateBatch,

    #[error("cannot read tensor data: {0}")]
    Tensor(String),
}

impl MelodyError {
    pub(crate) fn parse(token: &str, reason: impl Into<String>) -> Self {
        MelodyError::Parse {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}

pub type MelodyResult<T> = std::result::Result<T, MelodyError>;
