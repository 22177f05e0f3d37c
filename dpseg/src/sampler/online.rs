use std::collections::VecDeque;
use std::ops::AddAssign;

use log::{debug, error, warn};
#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use super::{Diagnostics, Model, Sampler};
use crate::{Annealing, Error, EstimateOptions, ForgetMethod, Parameters, Result, Sentence};

/// Incremental sampler that makes a single pass over the corpus per iteration
///
/// Sentences start out uncounted. Each one is segmented against the lexicon built from the
/// sentences seen before it, then counted. With a positive `forget_rate`, the oldest seen
/// sentences are uncounted again once more than `forget_window` of them are counted.
#[derive(Clone, Debug)]
pub struct OnlineSampler {
    model: Model,
    /// Counted sentences, oldest first
    seen: VecDeque<usize>,
    /// Sentences processed across all iterations
    processed: usize,
}

impl OnlineSampler {
    pub fn new(params: Parameters, annealing: Annealing, sentences: Vec<Sentence>) -> Result<Self> {
        Ok(Self {
            model: Model::new(params, annealing, sentences)?,
            seen: VecDeque::new(),
            processed: 0,
        })
    }

    /// Attach held-out sentences, evaluated during `estimate()` without being trained on
    pub fn with_eval(mut self, eval: Vec<Sentence>) -> Self {
        self.model.set_eval(eval);
        self
    }

    /// Indices of the counted sentences, oldest first
    pub fn seen(&self) -> impl Iterator<Item = usize> + '_ {
        self.seen.iter().copied()
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Uncount the `upto` oldest seen sentences
    ///
    /// A word that is no longer in the lexicon is skipped and reported as clamped; this only
    /// happens if a sentence was forgotten twice.
    pub fn forget_items(&mut self, upto: usize) -> ForgetReport {
        let upto = upto.min(self.seen.len());
        let mut report = ForgetReport::default();
        let model = &mut self.model;

        for index in self.seen.drain(..upto) {
            for word in model.sentences[index].words() {
                match model.lexicon.remove_clamped(word) {
                    true => report.tokens += 1,
                    false => report.clamped += 1,
                }
            }
            model.counted[index] = false;
            model.utterances -= 1;
            report.sentences += 1;
        }

        if report.clamped > 0 {
            warn!(
                "forgetting {} sentences: {} words were no longer counted",
                report.sentences, report.clamped
            );
        }
        report
    }

    /// Apply the configured forgetting policy
    fn forget(&mut self) -> Option<ForgetReport> {
        let params = &self.model.params;
        let seen = self.seen.len();
        if params.forget_rate == 0.0 || seen <= params.forget_window {
            return None;
        }

        let upto = match params.forget_method {
            ForgetMethod::Oldest => seen - params.forget_window,
            ForgetMethod::Proportional => {
                ((params.forget_rate * seen as f64).ceil() as usize).clamp(1, seen)
            }
        };

        let report = self.forget_items(upto);
        debug!(
            "forgot {} sentences ({} tokens), {} still counted",
            report.sentences,
            report.tokens,
            self.seen.len()
        );
        Some(report)
    }
}

impl Sampler for OnlineSampler {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    /// Segment one sentence against the counts of the others, then count it as the newest
    fn estimate_sentence(
        &mut self,
        index: usize,
        temperature: f64,
        maximize: bool,
    ) -> Result<usize> {
        let slot = match self.model.counted[index] {
            true => {
                self.model.uncount_sentence(index)?;
                let slot = self.seen.iter().position(|&i| i == index);
                if let Some(slot) = slot {
                    self.seen.remove(slot);
                }
                slot
            }
            false => None,
        };

        let model = &mut self.model;
        let before = model.sentences[index].boundary_flags().to_vec();
        let utterances = model.utterance_model();
        let result = model.sentences[index].sample_fixed(
            index,
            &model.lexicon,
            utterances,
            temperature,
            maximize,
            &mut model.lattice,
            &mut model.rng,
        );

        if let Err(err) = result {
            // Put a previously counted sentence back where it was.
            if let Some(slot) = slot {
                model.count_sentence(index);
                self.seen.insert(slot, index);
            }
            return Err(err);
        }

        model.count_sentence(index);
        self.seen.push_back(index);

        let after = model.sentences[index].boundary_flags();
        Ok(before.iter().zip(after).filter(|(a, b)| a != b).count())
    }

    fn estimate(&mut self, opts: EstimateOptions, diagnostics: &mut dyn Diagnostics) -> Result<()> {
        opts.validate()?;

        for i in 0..opts.iters {
            let per_sentence = opts.is_decayed && self.model.params.anneal_per_sentence;
            let mut temperature = self.model.temperature(&opts, self.model.iteration);
            let mut degenerate = 0;
            let mut forgotten = ForgetReport::default();

            for index in 0..self.model.sentences.len() {
                if per_sentence {
                    temperature = self.model.annealing.temperature_at(self.processed);
                }

                match self.estimate_sentence(index, temperature, opts.maximize) {
                    Ok(_) => {}
                    Err(err @ Error::Degenerate { .. }) => {
                        warn!("{}", err);
                        degenerate += 1;
                    }
                    Err(err) => return Err(err),
                }

                self.processed += 1;
                if let Some(report) = self.forget() {
                    forgotten += report;
                }
            }

            let iteration = self.model.iteration;
            let last = i + 1 == opts.iters;
            self.model.finish_iteration(
                last,
                temperature,
                degenerate,
                forgotten,
                &opts,
                diagnostics,
            )?;
            if !self.sanity_check() {
                return Err(Error::Inconsistent { iteration });
            }
        }

        Ok(())
    }

    fn sanity_check(&self) -> bool {
        let counted = (0..self.model.sentences.len())
            .filter(|&i| self.model.counted[i])
            .count();
        if counted != self.seen.len() || self.seen.iter().any(|&i| !self.model.counted[i]) {
            error!(
                "{} sentences counted but {} in the seen set",
                counted,
                self.seen.len()
            );
            return false;
        }

        self.model.sanity_check()
    }
}

/// What a call to `OnlineSampler::forget_items()` removed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
pub struct ForgetReport {
    pub sentences: usize,
    /// Word tokens subtracted from the lexicon
    pub tokens: usize,
    /// Words that could not be subtracted because their count was already zero
    pub clamped: usize,
}

impl AddAssign for ForgetReport {
    fn add_assign(&mut self, other: Self) {
        self.sentences += other.sentences;
        self.tokens += other.tokens;
        self.clamped += other.clamped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BatchSampler, Init, LogDiagnostics, Statistics};

    fn sentences(texts: &[&str]) -> Vec<Sentence> {
        texts
            .iter()
            .map(|text| Sentence::new(text).unwrap())
            .collect()
    }

    fn params(forget_rate: f64, forget_window: usize, forget_method: ForgetMethod) -> Parameters {
        Parameters {
            seed: Some(5),
            forget_rate,
            forget_window,
            forget_method,
            ..Parameters::default()
        }
    }

    #[test]
    fn starts_uncounted() {
        let sampler = OnlineSampler::new(
            params(0.0, 1000, ForgetMethod::Oldest),
            Annealing::Flat,
            sentences(&["thecat", "thedog"]),
        )
        .unwrap();
        assert_eq!(sampler.lexicon().total_count(), 0);
        assert_eq!(sampler.seen_len(), 0);
        assert!(sampler.sanity_check());
    }

    #[test]
    fn single_pass_counts_everything() {
        let mut sampler = OnlineSampler::new(
            params(0.0, 1000, ForgetMethod::Oldest),
            Annealing::Flat,
            sentences(&["thecat", "thedog", "acat"]),
        )
        .unwrap();
        sampler
            .estimate(EstimateOptions::new(1), &mut LogDiagnostics)
            .unwrap();

        assert_eq!(sampler.seen().collect::<Vec<_>>(), vec![0, 1, 2]);
        let tokens = sampler
            .sentences()
            .iter()
            .map(|s| s.words().count())
            .sum::<usize>();
        assert_eq!(sampler.lexicon().total_count(), tokens);
        assert!(sampler.sanity_check());
    }

    #[test]
    fn replay_recounts_each_sentence_once() {
        let mut sampler = OnlineSampler::new(
            params(0.0, 1000, ForgetMethod::Oldest),
            Annealing::Flat,
            sentences(&["thecat", "thedog", "acat"]),
        )
        .unwrap();
        sampler
            .estimate(EstimateOptions::new(3), &mut LogDiagnostics)
            .unwrap();
        assert_eq!(sampler.seen_len(), 3);
        assert_eq!(sampler.model().iterations(), 3);
        assert!(sampler.sanity_check());
    }

    #[test]
    fn forget_items_subtracts_exactly_the_oldest() {
        let mut sampler = OnlineSampler::new(
            params(0.0, 1000, ForgetMethod::Oldest),
            Annealing::Flat,
            sentences(&["thecat", "thedog"]),
        )
        .unwrap();
        sampler
            .estimate(EstimateOptions::new(1), &mut LogDiagnostics)
            .unwrap();

        let total = sampler.lexicon().total_count();
        let oldest = sampler.sentences()[0].words().count();
        let report = sampler.forget_items(1);

        assert_eq!(report.sentences, 1);
        assert_eq!(report.tokens, oldest);
        assert_eq!(report.clamped, 0);
        assert_eq!(sampler.lexicon().total_count(), total - oldest);
        assert_eq!(sampler.seen().collect::<Vec<_>>(), vec![1]);
        assert!(!sampler.model().is_counted(0));
        assert!(sampler.sanity_check());

        assert_eq!(sampler.forget_items(5).sentences, 1);
        assert_eq!(sampler.lexicon().total_count(), 0);
        assert_eq!(sampler.forget_items(1), ForgetReport::default());
    }

    #[test]
    fn window_of_one_keeps_latest_sentence() {
        let mut sampler = OnlineSampler::new(
            params(1.0, 1, ForgetMethod::Oldest),
            Annealing::Flat,
            sentences(&["thecat", "thedog"]),
        )
        .unwrap();
        sampler
            .estimate(EstimateOptions::new(1), &mut LogDiagnostics)
            .unwrap();

        assert_eq!(sampler.seen().collect::<Vec<_>>(), vec![1]);
        let latest = sampler.sentences()[1].words().count();
        assert_eq!(sampler.lexicon().total_count(), latest);
        assert!(sampler.sanity_check());
    }

    #[test]
    fn forgetting_is_reported_per_iteration() {
        let params = Parameters {
            trace_every: 1,
            ..params(1.0, 1, ForgetMethod::Oldest)
        };
        let mut sampler = OnlineSampler::new(
            params,
            Annealing::Flat,
            sentences(&["thecat", "thedog", "acat"]),
        )
        .unwrap();

        let mut stats: Vec<Statistics> = Vec::new();
        sampler.estimate(EstimateOptions::new(1), &mut stats).unwrap();

        let forgotten = sampler.sentences()[..2]
            .iter()
            .map(|s| s.words().count())
            .sum::<usize>();
        assert_eq!(
            stats[0].forgotten,
            ForgetReport {
                sentences: 2,
                tokens: forgotten,
                clamped: 0,
            }
        );
        assert_eq!(stats[0].utterances, 1);
    }

    #[test]
    fn tiny_temperature_is_not_degenerate() {
        let mut sampler = OnlineSampler::new(
            params(0.0, 1000, ForgetMethod::Oldest),
            Annealing::Flat,
            sentences(&["thecat", "thedog"]),
        )
        .unwrap();
        for _ in 0..2 {
            for index in 0..2 {
                sampler.estimate_sentence(index, 1e-308, false).unwrap();
            }
        }
        assert_eq!(sampler.seen_len(), 2);
        assert!(sampler.sanity_check());
    }

    #[test]
    fn seen_set_is_bounded() {
        let texts = (0..200)
            .map(|i| ["thecat", "adog", "thedogsat", "acatsat"][i % 4])
            .collect::<Vec<_>>();

        for method in [ForgetMethod::Oldest, ForgetMethod::Proportional] {
            let mut sampler =
                OnlineSampler::new(params(0.3, 16, method), Annealing::Flat, sentences(&texts))
                    .unwrap();
            for index in 0..texts.len() {
                sampler.estimate_sentence(index, 1.0, false).unwrap();
                sampler.forget();
                assert!(sampler.seen_len() <= 16);
            }
            assert!(sampler.sanity_check());
        }
    }

    #[test]
    fn matches_a_batch_state() {
        let texts = ["thecat", "thedog"];
        let mut online = OnlineSampler::new(
            params(0.0, 1000, ForgetMethod::Oldest),
            Annealing::Flat,
            sentences(&texts),
        )
        .unwrap();
        online
            .estimate(EstimateOptions::new(1), &mut LogDiagnostics)
            .unwrap();

        // A batch sampler initialized with the online segmentation holds the same counts.
        let segmented = online
            .sentences()
            .iter()
            .map(|s| Sentence::from_words(&s.words().collect::<Vec<_>>()).unwrap())
            .collect::<Vec<_>>();
        let batch_params = Parameters {
            init: Init::Gold,
            ..params(0.0, 1000, ForgetMethod::Oldest)
        };
        let batch = BatchSampler::new(batch_params, Annealing::Flat, segmented).unwrap();

        assert_eq!(
            batch.lexicon().total_count(),
            online.lexicon().total_count()
        );
        let mut online_types = online.lexicon().iter().collect::<Vec<_>>();
        let mut batch_types = batch.lexicon().iter().collect::<Vec<_>>();
        online_types.sort();
        batch_types.sort();
        assert_eq!(online_types, batch_types);
    }

    #[test]
    fn per_sentence_annealing() {
        let params = Parameters {
            anneal_per_sentence: true,
            trace_every: 1,
            ..params(0.0, 1000, ForgetMethod::Oldest)
        };
        let mut sampler = OnlineSampler::new(
            params,
            Annealing::stepped(10, 5.0, 1.0).unwrap(),
            sentences(&["ab", "ba", "abab", "baba", "aa"]),
        )
        .unwrap();

        let mut stats: Vec<Statistics> = Vec::new();
        let opts = EstimateOptions {
            iters: 2,
            is_decayed: true,
            ..EstimateOptions::default()
        };
        sampler.estimate(opts, &mut stats).unwrap();

        // The reported temperature is that of the last sentence of each pass.
        let schedule = Annealing::stepped(10, 5.0, 1.0).unwrap();
        assert_eq!(stats[0].temperature, schedule.temperature_at(4));
        assert_eq!(stats[1].temperature, schedule.temperature_at(9));
    }
}
