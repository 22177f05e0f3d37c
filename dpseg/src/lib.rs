//! Unsupervised word segmentation by Gibbs sampling a Dirichlet process unigram model
//!
//! Boundaries between words are inferred from unsegmented utterances. A `BatchSampler` revisits
//! every sentence each iteration; an `OnlineSampler` makes incremental passes and can forget old
//! sentences to bound the size of the lexicon.
//!
//! ```
//! use dpseg::{
//!     Annealing, BatchSampler, EstimateOptions, LogDiagnostics, Parameters, Sampler, Sentence,
//! };
//!
//! let sentences = ["thedog", "thecat", "adog"]
//!     .iter()
//!     .map(|text| Sentence::new(text))
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//!
//! let params = Parameters { seed: Some(1), ..Parameters::default() };
//! let mut sampler = BatchSampler::new(params, Annealing::Flat, sentences).unwrap();
//! sampler.estimate(EstimateOptions::new(10), &mut LogDiagnostics).unwrap();
//! assert!(sampler.sanity_check());
//! ```

mod annealing;
mod corpus;
mod error;
mod lexicon;
mod params;
mod sampler;
mod scores;
mod sentence;

#[cfg(feature = "test-cases")]
pub mod test_cases;

pub use annealing::Annealing;
pub use corpus::{segmentation_entropy, top_frequency, CorpusSummary};
pub use error::{Error, Result};
pub use lexicon::{BaseDistribution, Unigrams};
pub use params::{EstimateOptions, ForgetMethod, Init, Parameters};
pub use sampler::{
    BatchSampler, Diagnostics, ForgetReport, LogDiagnostics, Model, OnlineSampler, Sampler,
    Statistics,
};
pub use scores::{Fscore, Scores};
pub use sentence::Sentence;

type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
