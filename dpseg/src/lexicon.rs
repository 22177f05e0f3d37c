#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};
use smartstring::alias::String;

use crate::{Error, HashMap, Result};

/// Prior over word shapes used for words the lexicon has not seen (often)
///
/// A word of `n` symbols gets `p * (1 - p)^(n - 1) * (1 / symbols)^n`, i.e. a geometric length
/// distribution with stop probability `p` and symbols drawn uniformly from the inventory.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
pub struct BaseDistribution {
    stop: f64,
    symbols: usize,
}

impl BaseDistribution {
    pub fn new(stop: f64, symbols: usize) -> Self {
        Self {
            stop,
            symbols: symbols.max(1),
        }
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    pub fn symbols(&self) -> usize {
        self.symbols
    }

    /// Log probability of a word of `len` symbols
    pub fn log_prob_len(&self, len: usize) -> f64 {
        if len == 0 {
            return f64::NEG_INFINITY;
        }

        let len = len as f64;
        self.stop.ln() + (len - 1.0) * (1.0 - self.stop).ln() - len * (self.symbols as f64).ln()
    }

    pub fn log_prob(&self, word: &str) -> f64 {
        self.log_prob_len(word.chars().count())
    }
}

/// Word type counts backing a Dirichlet process unigram model
///
/// Only counts are stored: under a Dirichlet process the predictive probability of the next
/// token and the marginal probability of the token multiset both depend on counts alone, so no
/// table assignments are tracked.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
pub struct Unigrams {
    counts: HashMap<String, u32>,
    total: usize,
    base: BaseDistribution,
    concentration: f64,
}

impl Unigrams {
    /// Create an empty lexicon with the given concentration and base distribution
    pub fn new(concentration: f64, base: BaseDistribution) -> Self {
        Self {
            counts: HashMap::default(),
            total: 0,
            base,
            concentration,
        }
    }

    /// Predictive probability of `word` given the current counts
    pub fn prob(&self, word: &str) -> f64 {
        self.log_prob(word).exp()
    }

    /// Log of `prob(word)`, finite even when the base probability underflows
    pub fn log_prob(&self, word: &str) -> f64 {
        self.log_numerator(word, self.count(word)) - (self.total as f64 + self.concentration).ln()
    }

    /// Log predictive probability of `word` after one more occurrence of `added`
    ///
    /// Equivalent to `insert(added); log_prob(word); remove(added)` without touching the counts.
    pub fn log_prob_with(&self, word: &str, added: &str) -> f64 {
        let mut n_w = self.count(word);
        if word == added {
            n_w += 1;
        }

        self.log_numerator(word, n_w) - (self.total as f64 + 1.0 + self.concentration).ln()
    }

    /// `ln(n_w + a * P0(word))`
    fn log_numerator(&self, word: &str, n_w: usize) -> f64 {
        let mass = self.concentration.ln() + self.base.log_prob(word);
        match n_w {
            0 => mass,
            n => log_add((n as f64).ln(), mass),
        }
    }

    pub fn insert(&mut self, word: &str) {
        *self.counts.entry(word.into()).or_insert(0) += 1;
        self.total += 1;
    }

    /// Remove one occurrence of `word`
    ///
    /// Removing a word that has no recorded occurrence is a caller error and leaves the counts
    /// untouched.
    pub fn remove(&mut self, word: &str) -> Result<()> {
        match self.remove_clamped(word) {
            true => Ok(()),
            false => Err(Error::MissingWord { word: word.into() }),
        }
    }

    /// Remove one occurrence of `word` if there is one; returns `false` if the count was zero
    pub fn remove_clamped(&mut self, word: &str) -> bool {
        let count = match self.counts.get_mut(word) {
            Some(count) => count,
            None => return false,
        };

        *count -= 1;
        if *count == 0 {
            self.counts.remove(word);
        }
        self.total -= 1;
        true
    }

    pub fn count(&self, word: &str) -> usize {
        self.counts.get(word).copied().unwrap_or(0) as usize
    }

    /// Number of word tokens currently counted
    pub fn total_count(&self) -> usize {
        self.total
    }

    /// Number of distinct word types with a positive count
    pub fn types(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.counts
            .iter()
            .map(|(word, count)| (word.as_str(), *count as usize))
    }

    /// Log marginal probability of the counted tokens under the Dirichlet process
    pub fn log_marginal(&self) -> f64 {
        self.log_marginal_with(self.concentration, self.base)
    }

    /// `log_marginal()` evaluated under other hyperparameters, without changing them
    pub fn log_marginal_with(&self, concentration: f64, base: BaseDistribution) -> f64 {
        let mut lp = 0.0;
        for (word, &count) in self.counts.iter() {
            let log_mass = concentration.ln() + base.log_prob(word);
            lp += log_mass;
            let mass = log_mass.exp();
            for k in 1..count {
                lp += (k as f64 + mass).ln();
            }
        }

        for i in 0..self.total {
            lp -= (i as f64 + concentration).ln();
        }
        lp
    }

    pub fn concentration(&self) -> f64 {
        self.concentration
    }

    pub fn set_concentration(&mut self, concentration: f64) {
        self.concentration = concentration;
    }

    pub fn base(&self) -> BaseDistribution {
        self.base
    }

    pub fn set_base(&mut self, base: BaseDistribution) {
        self.base = base;
    }

    pub(crate) fn counts(&self) -> &HashMap<String, u32> {
        &self.counts
    }
}

/// `ln(exp(a) + exp(b))`
pub(crate) fn log_add(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    if lo == f64::NEG_INFINITY {
        return hi;
    }
    hi + (lo - hi).exp().ln_1p()
}
