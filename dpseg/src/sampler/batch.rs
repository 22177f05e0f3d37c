use log::{debug, warn};

use super::{Diagnostics, ForgetReport, Model, Sampler};
use crate::{Annealing, Error, EstimateOptions, Parameters, Result, Sentence};

/// Gibbs sampler that sweeps the whole corpus every iteration
///
/// All training sentences are counted from construction on, under the boundaries chosen by
/// `Parameters::init`. Each iteration resamples every boundary of every sentence in corpus
/// order.
#[derive(Clone, Debug)]
pub struct BatchSampler {
    model: Model,
}

impl BatchSampler {
    pub fn new(params: Parameters, annealing: Annealing, sentences: Vec<Sentence>) -> Result<Self> {
        let init = params.init;
        let mut model = Model::new(params, annealing, sentences)?;
        for index in 0..model.sentences.len() {
            model.sentences[index].init(init, &mut model.rng);
            model.count_sentence(index);
        }

        Ok(Self { model })
    }

    /// Attach held-out sentences, evaluated during `estimate()` without being trained on
    pub fn with_eval(mut self, eval: Vec<Sentence>) -> Self {
        self.model.set_eval(eval);
        self
    }
}

impl Sampler for BatchSampler {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn estimate_sentence(
        &mut self,
        index: usize,
        temperature: f64,
        maximize: bool,
    ) -> Result<usize> {
        let model = &mut self.model;
        let utterances = model.utterance_model();
        model.sentences[index].sample_by_flips(
            index,
            &mut model.lexicon,
            utterances,
            temperature,
            maximize,
            &mut model.rng,
        )
    }

    fn estimate(&mut self, opts: EstimateOptions, diagnostics: &mut dyn Diagnostics) -> Result<()> {
        opts.validate()?;

        for i in 0..opts.iters {
            let temperature = self.model.temperature(&opts, self.model.iteration);
            let (mut changed, mut degenerate) = (0, 0);
            for index in 0..self.model.sentences.len() {
                match self.estimate_sentence(index, temperature, opts.maximize) {
                    Ok(n) => changed += n,
                    Err(err @ Error::Degenerate { .. }) => {
                        warn!("{}", err);
                        degenerate += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
            debug!(
                "iteration {}: {} boundaries changed",
                self.model.iteration, changed
            );

            let iteration = self.model.iteration;
            let last = i + 1 == opts.iters;
            self.model.finish_iteration(
                last,
                temperature,
                degenerate,
                ForgetReport::default(),
                &opts,
                diagnostics,
            )?;
            if !self.sanity_check() {
                return Err(Error::Inconsistent { iteration });
            }
        }

        Ok(())
    }
}
