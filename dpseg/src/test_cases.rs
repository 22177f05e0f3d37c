use crate::{EstimateOptions, LogDiagnostics, Sampler, Scores, Sentence};

/// Train `sampler` on its sentences and check the invariants every strategy must keep
pub fn run(sampler: &mut dyn Sampler, opts: EstimateOptions) -> Scores {
    let texts = sampler
        .sentences()
        .iter()
        .map(|s| s.text().to_owned())
        .collect::<Vec<_>>();

    sampler.estimate(opts, &mut LogDiagnostics).unwrap();
    assert!(sampler.sanity_check());
    assert!(sampler.log_posterior().is_finite());

    for (sentence, text) in sampler.sentences().iter().zip(texts) {
        assert_eq!(sentence.words().collect::<String>(), text);
    }

    Scores::compute(sampler.sentences())
}

/// Gold-segmented copy of `CORPUS`
pub fn sentences() -> Vec<Sentence> {
    CORPUS
        .iter()
        .map(|words| Sentence::from_words(words).unwrap())
        .collect()
}

/// Built-in corpus of short gold-segmented utterances
///
/// Orthographic, lowercase, with the kind of repetition found in child-directed speech.
pub const CORPUS: &[&[&str]] = &[
    &["you", "want", "to", "see", "the", "book"],
    &["look", "there", "is", "a", "boy", "with", "his", "hat"],
    &["and", "a", "doggie"],
    &["you", "want", "to", "look", "at", "this"],
    &["look", "at", "this"],
    &["have", "a", "drink"],
    &["okay", "now"],
    &["what", "is", "this"],
    &["okay"],
    &["what", "is", "it"],
    &["look", "can", "you", "take", "it", "out"],
    &["take", "it", "out"],
    &["you", "want", "it", "in"],
    &["put", "that", "on"],
    &["that"],
    &["yes"],
    &["okay"],
    &["open", "it"],
    &["look", "at", "the", "doggie"],
    &["is", "that", "a", "doggie"],
    &["what", "is", "the", "doggie", "doing"],
    &["the", "doggie", "wants", "the", "book"],
    &["you", "see", "the", "boy"],
    &["the", "boy", "has", "a", "hat"],
    &["where", "is", "the", "hat"],
    &["there", "it", "is"],
    &["put", "the", "hat", "on"],
    &["can", "you", "put", "it", "on"],
    &["look", "at", "you"],
    &["what", "a", "big", "boy"],
    &["do", "you", "want", "a", "drink"],
    &["drink", "it", "now"],
    &["is", "it", "good"],
    &["good", "boy"],
    &["where", "is", "the", "book"],
    &["is", "this", "the", "book"],
    &["you", "want", "to", "open", "the", "book"],
    &["open", "the", "book"],
    &["look", "at", "the", "doggie", "in", "the", "book"],
    &["that", "is", "a", "big", "doggie"],
];
