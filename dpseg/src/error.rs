use thiserror::Error;

/// Errors produced while configuring or running a sampler
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected parameter, annealing schedule or temperature
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Utterance that cannot be sampled
    #[error("invalid sentence: {reason}")]
    InvalidSentence {
        /// Why the sentence was rejected
        reason: String,
    },

    /// Every candidate score for a move was zero or non-finite
    #[error("degenerate scores in sentence {sentence} at position {position}")]
    Degenerate {
        /// Index of the sentence within its collection
        sentence: usize,
        /// Symbol offset of the boundary (or lattice node) being scored
        position: usize,
    },

    /// Attempt to remove a word type with no recorded occurrences
    #[error("lexicon has no occurrence of {word:?}")]
    MissingWord {
        /// The word that was not found
        word: std::string::String,
    },

    /// Lexicon counts no longer match the committed segmentations
    #[error("lexicon inconsistent with segmentation after iteration {iteration}")]
    Inconsistent {
        /// Iteration after which the check failed
        iteration: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<std::string::String>) -> Self {
        Error::Config(msg.into())
    }
}

/// Result type for sampler operations
pub type Result<T> = std::result::Result<T, Error>;
