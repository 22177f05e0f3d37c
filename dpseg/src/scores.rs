use std::collections::HashSet;
use std::fmt;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::Sentence;

/// Precision, recall and F-score of a predicted segmentation against the gold one
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
pub struct Scores {
    pub token: Fscore,
    pub boundary: Fscore,
    pub lexicon: Fscore,
}

impl Scores {
    /// Score every sentence that carries a gold segmentation; the others are skipped
    pub fn compute<'a, I: IntoIterator<Item = &'a Sentence>>(sentences: I) -> Self {
        let mut token = Counts::default();
        let mut boundary = Counts::default();
        let mut found = HashSet::new();
        let mut gold_types = HashSet::new();

        for sentence in sentences {
            let gold = match sentence.gold() {
                Some(gold) => gold,
                None => continue,
            };
            let predicted = sentence.boundary_flags();
            let n = predicted.len() - 1;

            for pos in 1..n {
                boundary.add(predicted[pos], gold[pos]);
            }

            // A predicted token is correct when both of its ends are gold boundaries and no
            // gold boundary falls inside it.
            let starts = (0..n).filter(|&pos| predicted[pos]);
            for start in starts {
                let end = start + 1 + predicted[start + 1..].iter().position(|&b| b).unwrap_or(0);
                let matched = gold[start] && gold[end] && !gold[start + 1..end].iter().any(|&b| b);
                token.true_pos += matched as usize;
                token.predicted += 1;
                found.insert(sentence.word(start, end));
            }
            token.gold += gold.iter().filter(|&&b| b).count() - 1;

            if let Some(words) = sentence.gold_words() {
                gold_types.extend(words);
            }
        }

        let lexicon = Counts {
            true_pos: found.intersection(&gold_types).count(),
            predicted: found.len(),
            gold: gold_types.len(),
        };

        Self {
            token: token.fscore(),
            boundary: boundary.fscore(),
            lexicon: lexicon.fscore(),
        }
    }
}

impl fmt::Display for Scores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "token {} boundary {} lexicon {}",
            self.token, self.boundary, self.lexicon
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
pub struct Fscore {
    pub precision: f64,
    pub recall: f64,
    pub fscore: f64,
}

impl fmt::Display for Fscore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P={:.4} R={:.4} F={:.4}",
            self.precision, self.recall, self.fscore
        )
    }
}

#[derive(Default)]
struct Counts {
    true_pos: usize,
    predicted: usize,
    gold: usize,
}

impl Counts {
    fn add(&mut self, predicted: bool, gold: bool) {
        self.true_pos += (predicted && gold) as usize;
        self.predicted += predicted as usize;
        self.gold += gold as usize;
    }

    fn fscore(&self) -> Fscore {
        let ratio = |num: usize, den: usize| match den {
            0 => 0.0,
            den => num as f64 / den as f64,
        };

        let precision = ratio(self.true_pos, self.predicted);
        let recall = ratio(self.true_pos, self.gold);
        let fscore = match precision + recall {
            sum if sum > 0.0 => 2.0 * precision * recall / sum,
            _ => 0.0,
        };

        Fscore {
            precision,
            recall,
            fscore,
        }
    }
}
