use std::collections::HashSet;
use std::fmt;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::{HashMap, Sentence};

/// Width of the moving window for `CorpusSummary::mattr`
const MATTR_WINDOW: usize = 10;

/// Descriptive statistics of the current segmentation of a corpus
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
pub struct CorpusSummary {
    pub utterances: usize,
    pub single_word_utterances: usize,
    pub tokens: usize,
    pub types: usize,
    /// Types occurring exactly once
    pub hapax: usize,
    /// Moving-average type/token ratio over windows of ten tokens, `None` for shorter corpora
    pub mattr: Option<f64>,
    /// Mean word length in symbols
    pub average_word_length: f64,
}

impl CorpusSummary {
    pub fn describe<'a, I: IntoIterator<Item = &'a Sentence>>(sentences: I) -> Self {
        let mut summary = Self::default();
        let mut words = Vec::new();
        let mut symbols = 0;
        for sentence in sentences {
            let before = words.len();
            words.extend(sentence.words());
            if words.len() - before == 1 {
                summary.single_word_utterances += 1;
            }
            summary.utterances += 1;
            symbols += sentence.len();
        }

        let counts = frequencies(&words);
        summary.tokens = words.len();
        summary.types = counts.len();
        summary.hapax = counts.values().filter(|&&count| count == 1).count();

        if words.len() >= MATTR_WINDOW {
            let windows = words.len() - MATTR_WINDOW + 1;
            let ratios = words
                .windows(MATTR_WINDOW)
                .map(|window| window.iter().collect::<HashSet<_>>().len() as f64)
                .sum::<f64>();
            summary.mattr = Some(ratios / (MATTR_WINDOW * windows) as f64);
        }

        if summary.tokens > 0 {
            summary.average_word_length = symbols as f64 / summary.tokens as f64;
        }
        summary
    }
}

impl fmt::Display for CorpusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "utterances {} single-word {} tokens {} types {} hapax {}",
            self.utterances, self.single_word_utterances, self.tokens, self.types, self.hapax
        )?;
        if let Some(mattr) = self.mattr {
            write!(f, " mattr {:.4}", mattr)?;
        }
        write!(f, " awl {:.4}", self.average_word_length)
    }
}

/// The `n` most frequent words of the current segmentation, all of them if `n` is `None`
///
/// Ties are ordered alphabetically.
pub fn top_frequency<'a, I: IntoIterator<Item = &'a Sentence>>(
    sentences: I,
    n: Option<usize>,
) -> Vec<(&'a str, usize)> {
    let words = sentences
        .into_iter()
        .flat_map(|sentence| sentence.words())
        .collect::<Vec<_>>();

    let mut top = frequencies(&words).into_iter().collect::<Vec<_>>();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    if let Some(n) = n {
        top.truncate(n);
    }
    top
}

/// Normalized segmentation entropy of the current segmentation, in bits
///
/// Each token is weighted by its relative frequency `p`; the result is `-Σ p log2 p` over all
/// tokens divided by the number of possible boundaries, one less than the number of symbols.
/// Zero for a corpus of at most one symbol.
pub fn segmentation_entropy<'a, I: IntoIterator<Item = &'a Sentence>>(sentences: I) -> f64 {
    let mut words = Vec::new();
    let mut symbols = 0;
    for sentence in sentences {
        words.extend(sentence.words());
        symbols += sentence.len();
    }
    if symbols < 2 {
        return 0.0;
    }

    let counts = frequencies(&words);
    let total = words.len() as f64;
    let norm = (symbols - 1) as f64;
    -words
        .iter()
        .map(|word| {
            let p = counts[word] as f64 / total;
            p * p.log2() / norm
        })
        .sum::<f64>()
}

fn frequencies<'a>(words: &[&'a str]) -> HashMap<&'a str, usize> {
    let mut counts = HashMap::default();
    for &word in words {
        *counts.entry(word).or_insert(0) += 1;
    }
    counts
}
