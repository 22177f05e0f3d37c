use rand::Rng;
#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::lexicon::Unigrams;
use crate::{Error, Init, Result};

/// An utterance: an immutable symbol sequence with a mutable candidate segmentation
///
/// Symbols are `char`s. Boundaries are kept as one flag per symbol offset, so a sentence of
/// `n` symbols has `n + 1` flags; the first and last are always set.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
pub struct Sentence {
    text: std::string::String,
    offsets: Vec<usize>,
    boundaries: Vec<bool>,
    gold: Option<Vec<bool>>,
}

impl Sentence {
    /// Create an unsegmented sentence with no gold segmentation
    ///
    /// The sentence starts out as a single word; see `init()`.
    pub fn new(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(Error::InvalidSentence {
                reason: "empty utterance".into(),
            });
        }

        let mut offsets = text.char_indices().map(|(i, _)| i).collect::<Vec<_>>();
        offsets.push(text.len());

        let mut boundaries = vec![false; offsets.len()];
        boundaries[0] = true;
        boundaries[offsets.len() - 1] = true;

        Ok(Self {
            text: text.into(),
            offsets,
            boundaries,
            gold: None,
        })
    }

    /// Create a sentence from its gold segmentation
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> Result<Self> {
        if words.iter().any(|word| word.as_ref().is_empty()) {
            return Err(Error::InvalidSentence {
                reason: "empty word in gold segmentation".into(),
            });
        }

        let text = words.iter().map(|word| word.as_ref()).collect::<String>();
        let mut sentence = Self::new(&text)?;

        let mut gold = vec![false; sentence.boundaries.len()];
        let mut pos = 0;
        gold[0] = true;
        for word in words {
            pos += word.as_ref().chars().count();
            gold[pos] = true;
        }
        sentence.gold = Some(gold);
        Ok(sentence)
    }

    /// Reset the boundaries according to `init`
    pub fn init<R: Rng>(&mut self, init: Init, rng: &mut R) {
        let n = self.len();
        for pos in 1..n {
            self.boundaries[pos] = match init {
                Init::All => true,
                Init::None => false,
                Init::Random(p) => rng.random_bool(p),
                Init::Gold => self.gold.as_ref().map_or(false, |gold| gold[pos]),
            };
        }
    }

    /// Replace the internal boundaries with the given symbol offsets
    pub fn segment_at(&mut self, positions: &[usize]) -> Result<()> {
        let n = self.len();
        if let Some(&pos) = positions.iter().find(|&&pos| pos == 0 || pos >= n) {
            return Err(Error::InvalidSentence {
                reason: format!("boundary {} outside of 1..{}", pos, n),
            });
        }

        for flag in self.boundaries[1..n].iter_mut() {
            *flag = false;
        }
        for &pos in positions {
            self.boundaries[pos] = true;
        }
        Ok(())
    }

    /// Number of symbols
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Symbol offsets of the current boundaries, including both ends
    pub fn boundaries(&self) -> impl Iterator<Item = usize> + '_ {
        self.boundaries
            .iter()
            .enumerate()
            .filter_map(|(pos, &set)| if set { Some(pos) } else { None })
    }

    /// Words of the current segmentation
    pub fn words(&self) -> impl Iterator<Item = &str> + '_ {
        Words::new(self, &self.boundaries)
    }

    /// Words of the gold segmentation, if there is one
    pub fn gold_words(&self) -> Option<impl Iterator<Item = &str> + '_> {
        self.gold.as_ref().map(|gold| Words::new(self, gold))
    }

    pub(crate) fn gold(&self) -> Option<&[bool]> {
        self.gold.as_deref()
    }

    pub(crate) fn boundary_flags(&self) -> &[bool] {
        &self.boundaries
    }

    /// Substring between two symbol offsets
    pub fn word(&self, start: usize, end: usize) -> &str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    /// Add every word of the current segmentation to `lexicon`
    pub fn insert_words(&self, lexicon: &mut Unigrams) {
        for word in self.words() {
            lexicon.insert(word);
        }
    }

    /// Remove every word of the current segmentation from `lexicon`
    pub fn erase_words(&self, lexicon: &mut Unigrams) -> Result<()> {
        for word in self.words() {
            lexicon.remove(word)?;
        }
        Ok(())
    }

    /// Resample each internal boundary in turn, conditioned on everything else
    ///
    /// The sentence must be counted in `lexicon`. The words touching a boundary are removed
    /// while it is scored and the winning configuration is inserted again. Returns the number
    /// of boundaries that changed. If both configurations of some boundary score zero or
    /// non-finite, the sentence and the counts are restored to their state before the call
    /// and `Error::Degenerate` is returned.
    pub(crate) fn sample_by_flips<R: Rng>(
        &mut self,
        index: usize,
        lexicon: &mut Unigrams,
        model: Utterances,
        temperature: f64,
        maximize: bool,
        rng: &mut R,
    ) -> Result<usize> {
        let before = self.boundaries.clone();
        let n = self.len();
        let mut changed = 0;
        let mut left = 0;

        for pos in 1..n {
            let right = pos + 1 + self.boundaries[pos + 1..].iter().position(|&b| b).unwrap_or(0);
            let is_final = right == n;
            let current = self.boundaries[pos];

            let (w1, w2, w12) = (
                self.word(left, pos),
                self.word(pos, right),
                self.word(left, right),
            );

            if current {
                lexicon.remove(w1)?;
                lexicon.remove(w2)?;
            } else {
                lexicon.remove(w12)?;
            }

            // The final word of this sentence is only out of the counts if it is being scored.
            let utterances = match is_final {
                true => model.count.saturating_sub(1),
                false => model.count,
            };
            let tokens = lexicon.total_count();

            let split = lexicon.log_prob(w1)
                + model.log_end(utterances, tokens, false)
                + lexicon.log_prob_with(w2, w1)
                + model.log_end(utterances, tokens + 1, is_final);
            let joined = lexicon.log_prob(w12) + model.log_end(utterances, tokens, is_final);

            let degenerate = split.is_nan()
                || joined.is_nan()
                || (split == f64::NEG_INFINITY && joined == f64::NEG_INFINITY)
                || split == f64::INFINITY
                || joined == f64::INFINITY;

            if degenerate {
                self.restore(lexicon, current, left, pos, right, &before)?;
                return Err(Error::Degenerate {
                    sentence: index,
                    position: pos,
                });
            }

            let boundary = if maximize {
                if split > joined {
                    true
                } else if joined > split {
                    false
                } else {
                    current
                }
            } else {
                // Temper the difference, not the scores: each score alone can overflow.
                let p_split = 1.0 / (1.0 + ((joined - split) / temperature).exp());
                rng.random::<f64>() < p_split
            };

            if boundary {
                lexicon.insert(w1);
                lexicon.insert(w2);
                left = pos;
            } else {
                lexicon.insert(w12);
            }

            if boundary != current {
                changed += 1;
            }
            self.boundaries[pos] = boundary;
        }

        Ok(changed)
    }

    /// Undo a partially applied `sample_by_flips()`
    fn restore(
        &mut self,
        lexicon: &mut Unigrams,
        current: bool,
        left: usize,
        pos: usize,
        right: usize,
        before: &[bool],
    ) -> Result<()> {
        if current {
            lexicon.insert(self.word(left, pos));
            lexicon.insert(self.word(pos, right));
        } else {
            lexicon.insert(self.word(left, right));
        }

        self.erase_words(lexicon)?;
        self.boundaries.copy_from_slice(before);
        self.insert_words(lexicon);
        Ok(())
    }

    /// Resegment the whole sentence against a fixed lexicon
    ///
    /// Samples a segmentation from the distribution over all segmentations (forward filtering,
    /// backward sampling), or picks the best one if `maximize` is set. The lexicon is only read,
    /// so the sentence must not be counted in it. On failure the boundaries are left unchanged.
    pub(crate) fn sample_fixed<R: Rng>(
        &mut self,
        index: usize,
        lexicon: &Unigrams,
        model: Utterances,
        temperature: f64,
        maximize: bool,
        lattice: &mut Lattice,
        rng: &mut R,
    ) -> Result<()> {
        let n = self.len();
        lattice.clear(n);

        let tokens = lexicon.total_count();
        let ends = [
            model.log_end(model.count, tokens, false),
            model.log_end(model.count, tokens, true),
        ];
        let score = |start: usize, end: usize| {
            lexicon.log_prob(self.word(start, end)) + ends[(end == n) as usize]
        };

        // Forward scores are kept multiplied by the temperature; only offsets from the best
        // incoming path are divided by it.
        lattice.forward[0] = 0.0;
        for end in 1..=n {
            let mut best = 0;
            let mut max = f64::NEG_INFINITY;
            for start in 0..end {
                let value = lattice.forward[start] + score(start, end);
                if value > max {
                    max = value;
                    best = start;
                }
            }

            lattice.forward[end] = match maximize || !max.is_finite() {
                true => max,
                false => {
                    let sum = (0..end)
                        .map(|start| {
                            ((lattice.forward[start] + score(start, end) - max) / temperature).exp()
                        })
                        .sum::<f64>();
                    max + temperature * sum.ln()
                }
            };
            lattice.back[end] = best;
        }

        if !lattice.forward[n].is_finite() {
            return Err(Error::Degenerate {
                sentence: index,
                position: n,
            });
        }

        let mut boundaries = vec![false; n + 1];
        boundaries[0] = true;
        boundaries[n] = true;
        let mut end = n;
        while end > 0 {
            let start = match maximize {
                true => lattice.back[end],
                false => {
                    lattice.weights.clear();
                    lattice
                        .weights
                        .extend((0..end).map(|start| lattice.forward[start] + score(start, end)));
                    let max = lattice.weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    for weight in lattice.weights.iter_mut() {
                        *weight = (*weight - max) / temperature;
                    }
                    match draw(&lattice.weights, rng) {
                        Some(start) => start,
                        None => {
                            return Err(Error::Degenerate {
                                sentence: index,
                                position: end,
                            })
                        }
                    }
                }
            };
            boundaries[start] = true;
            end = start;
        }

        self.boundaries = boundaries;
        Ok(())
    }
}

/// Draw an index with probability proportional to `exp(weights[i])`
fn draw<R: Rng>(weights: &[f64], rng: &mut R) -> Option<usize> {
    let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return None;
    }

    let total = weights.iter().map(|w| (w - max).exp()).sum::<f64>();
    let mut target = rng.random::<f64>() * total;
    for (i, w) in weights.iter().enumerate() {
        let p = (w - max).exp();
        if target < p {
            return Some(i);
        }
        target -= p;
    }

    // Rounding can leave `target` just above the last weight.
    weights.iter().rposition(|w| w.is_finite())
}

/// Beta-Bernoulli model of whether a token ends its utterance
#[derive(Clone, Copy, Debug)]
pub(crate) struct Utterances {
    /// Number of utterances whose tokens are counted
    pub(crate) count: usize,
    /// Total prior mass, split evenly between final and non-final
    pub(crate) prior: f64,
}

impl Utterances {
    /// Log predictive probability that the next token is (not) final, given `tokens` counted
    /// tokens of which `finals` are final
    pub(crate) fn log_end(&self, finals: usize, tokens: usize, is_final: bool) -> f64 {
        let k = match is_final {
            true => finals,
            false => tokens.saturating_sub(finals),
        };
        ((k as f64 + self.prior / 2.0) / (tokens as f64 + self.prior)).ln()
    }

    /// Log marginal probability of `tokens` final/non-final flags, `finals` of them final
    pub(crate) fn log_marginal(&self, finals: usize, tokens: usize) -> f64 {
        let half = self.prior / 2.0;
        let mut lp = 0.0;
        for k in 0..finals {
            lp += (k as f64 + half).ln();
        }
        for k in 0..tokens.saturating_sub(finals) {
            lp += (k as f64 + half).ln();
        }
        for k in 0..tokens {
            lp -= (k as f64 + self.prior).ln();
        }
        lp
    }
}

/// Scratch buffers for `Sentence::sample_fixed()`, reused across sentences
#[derive(Clone, Debug, Default)]
pub(crate) struct Lattice {
    forward: Vec<f64>,
    back: Vec<usize>,
    weights: Vec<f64>,
}

impl Lattice {
    fn clear(&mut self, len: usize) {
        self.forward.clear();
        self.forward.resize(len + 1, f64::NEG_INFINITY);
        self.back.clear();
        self.back.resize(len + 1, 0);
        self.weights.clear();
    }
}

struct Words<'a> {
    sentence: &'a Sentence,
    flags: &'a [bool],
    start: usize,
}

impl<'a> Words<'a> {
    fn new(sentence: &'a Sentence, flags: &'a [bool]) -> Self {
        Self {
            sentence,
            flags,
            start: 0,
        }
    }
}

impl<'a> Iterator for Words<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.flags.len() - 1;
        if self.start >= n {
            return None;
        }

        let end = self.start + 1 + self.flags[self.start + 1..].iter().position(|&b| b)?;
        let word = self.sentence.word(self.start, end);
        self.start = end;
        Some(word)
    }
}
