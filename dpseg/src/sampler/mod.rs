use std::collections::HashSet;
use std::io;

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::corpus::segmentation_entropy;
use crate::lexicon::{BaseDistribution, Unigrams};
use crate::sentence::{Lattice, Utterances};
use crate::{Annealing, Error, EstimateOptions, HashMap, Parameters, Result, Scores, Sentence};

mod batch;
mod online;

pub use batch::BatchSampler;
pub use online::{ForgetReport, OnlineSampler};

/// A sampling strategy driving a `Model`
///
/// Implementors supply the per-sentence move and the iteration driver. Everything else is
/// provided on top of the shared model.
pub trait Sampler {
    fn model(&self) -> &Model;

    fn model_mut(&mut self) -> &mut Model;

    /// Resample the segmentation of one training sentence at the given temperature
    ///
    /// Returns the number of boundary positions that changed. `Error::Degenerate` means the move
    /// was abandoned and the sentence left as it was; any other error is fatal.
    fn estimate_sentence(
        &mut self,
        index: usize,
        temperature: f64,
        maximize: bool,
    ) -> Result<usize>;

    /// Run `opts.iters` iterations, reporting to `diagnostics`
    fn estimate(&mut self, opts: EstimateOptions, diagnostics: &mut dyn Diagnostics) -> Result<()>;

    /// Check that the lexicon holds exactly the words of the counted sentences
    fn sanity_check(&self) -> bool {
        self.model().sanity_check()
    }

    fn log_posterior(&self) -> f64 {
        self.model().log_posterior()
    }

    fn predict_pairs(&self, pairs: &[(&str, &str)]) -> Vec<f64> {
        self.model().predict_pairs(pairs)
    }

    fn print_lexicon(&self, out: &mut dyn io::Write) -> io::Result<()> {
        self.model().print_lexicon(out)
    }

    fn hypersample(&mut self, temperature: f64) -> Vec<bool> {
        self.model_mut().hypersample(temperature)
    }

    /// Resample a held-out sentence against the current lexicon without training on it
    fn estimate_eval_sentence(
        &mut self,
        index: usize,
        temperature: f64,
        maximize: bool,
    ) -> Result<()> {
        self.model_mut()
            .estimate_eval_sentence(index, temperature, maximize)
    }

    fn sentences(&self) -> &[Sentence] {
        &self.model().sentences
    }

    fn lexicon(&self) -> &Unigrams {
        &self.model().lexicon
    }
}

/// State shared by every sampling strategy
///
/// Owns the training and held-out sentences, the lexicon they are counted in and the random
/// number generator. Strategies only reach the lexicon through the model, so there is exactly
/// one copy of the counts per sampler.
#[derive(Clone, Debug)]
pub struct Model {
    params: Parameters,
    annealing: Annealing,
    lexicon: Unigrams,
    sentences: Vec<Sentence>,
    /// Whether each training sentence's words are currently in the lexicon
    counted: Vec<bool>,
    utterances: usize,
    eval: Vec<Sentence>,
    /// Iterations completed across all calls to `estimate`
    iteration: usize,
    rng: StdRng,
    lattice: Lattice,
}

impl Model {
    fn new(params: Parameters, annealing: Annealing, sentences: Vec<Sentence>) -> Result<Self> {
        params.validate()?;
        annealing.validate()?;

        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let base = BaseDistribution::new(params.stop_probability, symbols(&sentences, &[]));
        Ok(Self {
            lexicon: Unigrams::new(params.concentration, base),
            counted: vec![false; sentences.len()],
            utterances: 0,
            sentences,
            eval: Vec::new(),
            iteration: 0,
            rng,
            lattice: Lattice::default(),
            params,
            annealing,
        })
    }

    fn set_eval(&mut self, eval: Vec<Sentence>) {
        let base = BaseDistribution::new(
            self.lexicon.base().stop(),
            symbols(&self.sentences, &eval),
        );
        self.lexicon.set_base(base);
        self.eval = eval;
    }

    fn utterance_model(&self) -> Utterances {
        Utterances {
            count: self.utterances,
            prior: self.params.utterance_prior,
        }
    }

    fn count_sentence(&mut self, index: usize) {
        self.sentences[index].insert_words(&mut self.lexicon);
        self.counted[index] = true;
        self.utterances += 1;
    }

    fn uncount_sentence(&mut self, index: usize) -> Result<()> {
        self.sentences[index].erase_words(&mut self.lexicon)?;
        self.counted[index] = false;
        self.utterances -= 1;
        Ok(())
    }

    fn temperature(&self, opts: &EstimateOptions, index: usize) -> f64 {
        match opts.is_decayed {
            true => self.annealing.temperature_at(index),
            false => opts.temperature,
        }
    }

    pub fn sanity_check(&self) -> bool {
        let mut ok = true;
        for (i, sentence) in self.sentences.iter().chain(self.eval.iter()).enumerate() {
            let flags = sentence.boundary_flags();
            if !(flags[0] && flags[flags.len() - 1]) {
                error!("sentence {} lost its outer boundaries", i);
                ok = false;
            }
        }

        let mut expected = HashMap::<&str, u32>::default();
        let mut tokens = 0;
        let mut utterances = 0;
        for (sentence, _) in self
            .sentences
            .iter()
            .zip(self.counted.iter())
            .filter(|(_, &counted)| counted)
        {
            for word in sentence.words() {
                *expected.entry(word).or_insert(0) += 1;
                tokens += 1;
            }
            utterances += 1;
        }

        if tokens != self.lexicon.total_count() {
            error!(
                "lexicon holds {} tokens, segmentation has {}",
                self.lexicon.total_count(),
                tokens
            );
            ok = false;
        }

        if utterances != self.utterances {
            error!(
                "{} utterances recorded, {} counted",
                self.utterances, utterances
            );
            ok = false;
        }

        let counts = self.lexicon.counts();
        if counts.len() != expected.len() {
            error!(
                "lexicon holds {} types, segmentation has {}",
                counts.len(),
                expected.len()
            );
            ok = false;
        }

        for (word, &count) in expected.iter() {
            let found = counts.get(*word).copied().unwrap_or(0);
            if found != count {
                error!("count of {:?} is {}, expected {}", word, found, count);
                ok = false;
            }
        }

        ok
    }

    /// Log joint probability of the counted words and their utterance-final flags
    pub fn log_posterior(&self) -> f64 {
        self.lexicon.log_marginal()
            + self
                .utterance_model()
                .log_marginal(self.utterances, self.lexicon.total_count())
    }

    /// Log odds of a boundary between each pair of substrings versus joining them into one word
    ///
    /// Positive values favor the boundary. Both words are scored as non-final tokens.
    pub fn predict_pairs(&self, pairs: &[(&str, &str)]) -> Vec<f64> {
        let model = self.utterance_model();
        let tokens = self.lexicon.total_count();
        pairs
            .iter()
            .map(|&(left, right)| {
                let joined = format!("{}{}", left, right);
                let split = self.lexicon.log_prob(left)
                    + model.log_end(self.utterances, tokens, false)
                    + self.lexicon.log_prob_with(right, left)
                    + model.log_end(self.utterances, tokens + 1, false);
                split
                    - (self.lexicon.log_prob(&joined)
                        + model.log_end(self.utterances, tokens, false))
            })
            .collect()
    }

    /// Write `word\tcount` lines, most frequent first
    pub fn print_lexicon(&self, out: &mut dyn io::Write) -> io::Result<()> {
        let mut entries = self.lexicon.iter().collect::<Vec<_>>();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        for (word, count) in entries {
            writeln!(out, "{}\t{}", word, count)?;
        }
        Ok(())
    }

    /// One Metropolis-Hastings step for each hyperparameter
    ///
    /// The concentration moves by a random walk in log space under a Gamma prior; the stop
    /// probability by a random walk in logit space under a uniform prior. The log acceptance
    /// ratio of the posterior is divided by `temperature`. Returns whether each proposal
    /// (concentration, stop probability) was accepted.
    pub fn hypersample(&mut self, temperature: f64) -> Vec<bool> {
        let step = self.params.hypersample_step;
        let (shape, rate) = self.params.concentration_prior;
        let gamma = |a: f64| (shape - 1.0) * a.ln() - rate * a;

        let base = self.lexicon.base();
        let current = self.lexicon.concentration();
        let proposed = current * (step * (2.0 * self.rng.random::<f64>() - 1.0)).exp();
        let delta = self.lexicon.log_marginal_with(proposed, base) + gamma(proposed)
            - self.lexicon.log_marginal()
            - gamma(current);
        let concentration = self.accept(delta / temperature + (proposed / current).ln());
        if concentration {
            self.lexicon.set_concentration(proposed);
        }

        let concentration_now = self.lexicon.concentration();
        let stop = base.stop();
        let logit = (stop / (1.0 - stop)).ln() + step * (2.0 * self.rng.random::<f64>() - 1.0);
        let proposed = 1.0 / (1.0 + (-logit).exp());
        let stop_accepted = proposed > 0.0 && proposed < 1.0 && {
            let new_base = BaseDistribution::new(proposed, base.symbols());
            let delta = self.lexicon.log_marginal_with(concentration_now, new_base)
                - self.lexicon.log_marginal();
            let jacobian = (proposed * (1.0 - proposed) / (stop * (1.0 - stop))).ln();
            self.accept(delta / temperature + jacobian)
        };
        if stop_accepted {
            self.lexicon
                .set_base(BaseDistribution::new(proposed, base.symbols()));
        }

        debug!(
            "hypersample: concentration {:.4} ({}), stop {:.4} ({})",
            self.lexicon.concentration(),
            concentration,
            self.lexicon.base().stop(),
            stop_accepted
        );
        vec![concentration, stop_accepted]
    }

    fn accept(&mut self, log_ratio: f64) -> bool {
        if log_ratio.is_nan() {
            return false;
        }
        log_ratio >= 0.0 || self.rng.random::<f64>().ln() < log_ratio
    }

    pub fn estimate_eval_sentence(
        &mut self,
        index: usize,
        temperature: f64,
        maximize: bool,
    ) -> Result<()> {
        let model = self.utterance_model();
        self.eval[index].sample_fixed(
            index,
            &self.lexicon,
            model,
            temperature,
            maximize,
            &mut self.lattice,
            &mut self.rng,
        )
    }

    fn evaluate(
        &mut self,
        opts: &EstimateOptions,
        temperature: f64,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<()> {
        for _ in 0..opts.eval_iters {
            for index in 0..self.eval.len() {
                match self.estimate_eval_sentence(index, temperature, opts.maximize) {
                    Ok(()) => {}
                    Err(err @ Error::Degenerate { .. }) => warn!("held-out {}", err),
                    Err(err) => return Err(err),
                }
            }
        }

        let scores = Scores::compute(&self.eval);
        info!("held-out scores at iteration {}: {}", self.iteration, scores);
        diagnostics.scores(self.iteration, &scores);
        Ok(())
    }

    /// Bookkeeping after one pass over the training sentences
    fn finish_iteration(
        &mut self,
        last: bool,
        temperature: f64,
        degenerate: usize,
        forgotten: ForgetReport,
        opts: &EstimateOptions,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<()> {
        if degenerate > self.params.degenerate_warn {
            warn!(
                "{} degenerate moves in iteration {}; check the model parameters",
                degenerate, self.iteration
            );
            diagnostics.degenerate(self.iteration, degenerate);
        }

        let hypersampled = match self.params.hypersample {
            true => self.hypersample(temperature),
            false => Vec::new(),
        };

        if self.iteration % self.params.trace_every == 0 || last {
            let stats = Statistics {
                iteration: self.iteration,
                temperature,
                log_posterior: self.log_posterior(),
                tokens: self.lexicon.total_count(),
                types: self.lexicon.types(),
                utterances: self.utterances,
                entropy: segmentation_entropy(&self.sentences),
                degenerate,
                forgotten,
                hypersampled,
            };
            diagnostics.statistics(&stats);
        }

        if opts.eval_iters > 0
            && !self.eval.is_empty()
            && (self.iteration % self.params.eval_every == 0 || last)
        {
            self.evaluate(opts, temperature, diagnostics)?;
        }

        self.iteration += 1;
        Ok(())
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn lexicon(&self) -> &Unigrams {
        &self.lexicon
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn eval_sentences(&self) -> &[Sentence] {
        &self.eval
    }

    /// Whether the training sentence at `index` is currently counted in the lexicon
    pub fn is_counted(&self, index: usize) -> bool {
        self.counted[index]
    }

    /// Number of iterations completed so far
    pub fn iterations(&self) -> usize {
        self.iteration
    }

    /// Current segmentation of each training sentence, words joined by `separator`
    pub fn segmented_lines(&self, separator: &str) -> Vec<String> {
        self.sentences
            .iter()
            .map(|sentence| sentence.words().collect::<Vec<_>>().join(separator))
            .collect()
    }
}

/// Number of distinct symbols across both sentence collections
fn symbols(sentences: &[Sentence], eval: &[Sentence]) -> usize {
    sentences
        .iter()
        .chain(eval.iter())
        .flat_map(|sentence| sentence.text().chars())
        .collect::<HashSet<_>>()
        .len()
}

/// Per-iteration summary handed to a `Diagnostics` sink
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
pub struct Statistics {
    pub iteration: usize,
    pub temperature: f64,
    pub log_posterior: f64,
    /// Word tokens in the lexicon
    pub tokens: usize,
    /// Word types in the lexicon
    pub types: usize,
    /// Sentences counted in the lexicon
    pub utterances: usize,
    /// Normalized segmentation entropy of the training sentences, in bits
    pub entropy: f64,
    /// Moves abandoned because of degenerate scores
    pub degenerate: usize,
    /// Sentences and tokens forgotten during the iteration, online only
    pub forgotten: ForgetReport,
    /// Hypersampling acceptances, empty if hypersampling is off
    pub hypersampled: Vec<bool>,
}

/// Receiver for periodic statistics and held-out scores
pub trait Diagnostics {
    fn statistics(&mut self, stats: &Statistics);

    fn scores(&mut self, _iteration: usize, _scores: &Scores) {}

    /// Called when more than `Parameters::degenerate_warn` moves failed in one iteration
    fn degenerate(&mut self, _iteration: usize, _count: usize) {}
}

/// Reports statistics through the `log` facade
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn statistics(&mut self, stats: &Statistics) {
        info!(
            "iteration {} temperature {:.3} log posterior {:.3} tokens {} types {} entropy {:.4}",
            stats.iteration,
            stats.temperature,
            stats.log_posterior,
            stats.tokens,
            stats.types,
            stats.entropy
        );
        if stats.forgotten.sentences > 0 {
            info!(
                "forgot {} sentences ({} tokens)",
                stats.forgotten.sentences, stats.forgotten.tokens
            );
        }
    }
}

impl Diagnostics for Vec<Statistics> {
    fn statistics(&mut self, stats: &Statistics) {
        self.push(stats.clone());
    }
}
