#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Model and run configuration shared by both sampling strategies
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "with-serde", serde(default))]
pub struct Parameters {
    /// Dirichlet process concentration; higher values make new word types cheaper
    pub concentration: f64,
    /// Stop probability of the geometric word length prior
    pub stop_probability: f64,
    /// Total prior mass on utterance-final vs. non-final tokens
    pub utterance_prior: f64,
    /// Initial boundaries for training sentences (batch only; online starts uncounted)
    pub init: Init,
    /// Seed for the sampler's random number generator; `None` seeds from entropy
    pub seed: Option<u64>,
    /// Resample hyperparameters after every iteration
    pub hypersample: bool,
    /// Width of the log-space random walk used for hyperparameter proposals
    pub hypersample_step: f64,
    /// Shape and rate of the Gamma prior on the concentration
    pub concentration_prior: (f64, f64),
    /// Report statistics every this many iterations (the last iteration is always reported)
    pub trace_every: usize,
    /// Evaluate held-out sentences every this many iterations
    pub eval_every: usize,
    /// Number of degenerate moves in one iteration above which a configuration warning is logged
    pub degenerate_warn: usize,
    /// Fraction of the seen sentences to forget; 0 disables forgetting
    pub forget_rate: f64,
    /// Number of seen sentences above which forgetting kicks in
    pub forget_window: usize,
    pub forget_method: ForgetMethod,
    /// Look up the annealing temperature by sentence index rather than iteration (online only)
    pub anneal_per_sentence: bool,
}

impl Parameters {
    pub fn validate(&self) -> Result<()> {
        if !(self.concentration.is_finite() && self.concentration > 0.0) {
            return Err(Error::config(format!(
                "concentration must be positive, got {}",
                self.concentration
            )));
        }

        if !(self.stop_probability > 0.0 && self.stop_probability < 1.0) {
            return Err(Error::config(format!(
                "stop probability must be in (0, 1), got {}",
                self.stop_probability
            )));
        }

        if !(self.utterance_prior.is_finite() && self.utterance_prior > 0.0) {
            return Err(Error::config(format!(
                "utterance prior must be positive, got {}",
                self.utterance_prior
            )));
        }

        if let Init::Random(p) = self.init {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::config(format!(
                    "random init probability must be in [0, 1], got {}",
                    p
                )));
            }
        }

        if self.hypersample {
            if !(self.hypersample_step.is_finite() && self.hypersample_step > 0.0) {
                return Err(Error::config(format!(
                    "hypersample step must be positive, got {}",
                    self.hypersample_step
                )));
            }

            let (shape, rate) = self.concentration_prior;
            if !(shape > 0.0 && rate > 0.0) {
                return Err(Error::config(format!(
                    "concentration prior must have positive shape and rate, got ({}, {})",
                    shape, rate
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.forget_rate) {
            return Err(Error::config(format!(
                "forget rate must be in [0, 1], got {}",
                self.forget_rate
            )));
        }

        if self.forget_rate > 0.0 && self.forget_window == 0 {
            return Err(Error::config("forget window must be at least 1"));
        }

        if self.trace_every == 0 || self.eval_every == 0 {
            return Err(Error::config("reporting intervals must be at least 1"));
        }

        Ok(())
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            concentration: 20.0,
            stop_probability: 0.5,
            utterance_prior: 2.0,
            init: Init::Random(0.5),
            seed: None,
            hypersample: false,
            hypersample_step: 0.1,
            concentration_prior: (1.0, 0.1),
            trace_every: 10,
            eval_every: 10,
            degenerate_warn: 10,
            forget_rate: 0.0,
            forget_window: 1000,
            forget_method: ForgetMethod::Oldest,
            anneal_per_sentence: false,
        }
    }
}

/// Initial boundary configuration of a sentence
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
pub enum Init {
    /// Every symbol is a word
    All,
    /// The whole utterance is a single word
    None,
    /// Each internal boundary is present with the given probability
    Random(f64),
    /// Copy the gold boundaries (falls back to `None` for sentences without gold)
    Gold,
}

/// Which seen sentences get forgotten once the window is exceeded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
pub enum ForgetMethod {
    /// Forget oldest sentences until exactly `forget_window` remain
    Oldest,
    /// Forget the oldest `ceil(forget_rate * seen)` sentences
    Proportional,
}

/// Arguments to a run of `Sampler::estimate`
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
pub struct EstimateOptions {
    pub iters: usize,
    /// Sampling iterations over the held-out sentences at each evaluation
    pub eval_iters: usize,
    /// Fixed temperature, used unless `is_decayed`
    pub temperature: f64,
    /// Pick the highest scoring configuration instead of sampling
    pub maximize: bool,
    /// Take temperatures from the annealing schedule
    pub is_decayed: bool,
}

impl EstimateOptions {
    pub fn new(iters: usize) -> Self {
        Self {
            iters,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.temperature.is_finite() && self.temperature > 0.0 {
            true => Ok(()),
            false => Err(Error::config(format!(
                "temperature must be positive, got {}",
                self.temperature
            ))),
        }
    }
}

impl Default for EstimateOptions {
    fn default() -> Self {
        Self {
            iters: 1,
            eval_iters: 0,
            temperature: 1.0,
            maximize: false,
            is_decayed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Parameters::default().validate().unwrap();
        EstimateOptions::default().validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range() {
        let bad = [
            Parameters {
                forget_rate: 1.5,
                ..Parameters::default()
            },
            Parameters {
                forget_rate: -0.1,
                ..Parameters::default()
            },
            Parameters {
                concentration: 0.0,
                ..Parameters::default()
            },
            Parameters {
                stop_probability: 1.0,
                ..Parameters::default()
            },
            Parameters {
                init: Init::Random(2.0),
                ..Parameters::default()
            },
            Parameters {
                forget_rate: 0.5,
                forget_window: 0,
                ..Parameters::default()
            },
        ];

        for params in bad.iter() {
            assert!(matches!(params.validate(), Err(Error::Config(_))));
        }
    }

    #[test]
    fn rejects_bad_temperature() {
        for temperature in [0.0, -1.0, f64::INFINITY, f64::NAN] {
            let opts = EstimateOptions {
                temperature,
                ..EstimateOptions::default()
            };
            assert!(opts.validate().is_err());
        }
    }
}
