use dpseg::{
    segmentation_entropy, top_frequency, Annealing, BatchSampler, CorpusSummary, Diagnostics,
    EstimateOptions, ForgetMethod, Init, LogDiagnostics, OnlineSampler, Parameters, Sampler,
    Scores, Sentence, Statistics,
};

fn sentences(texts: &[&str]) -> Vec<Sentence> {
    texts
        .iter()
        .map(|text| Sentence::new(text).unwrap())
        .collect()
}

fn boundaries(sampler: &dyn Sampler) -> usize {
    sampler
        .sentences()
        .iter()
        .map(|s| s.boundaries().count())
        .sum()
}

#[test]
fn maximize_merges_characters_into_words() {
    let params = Parameters {
        init: Init::All,
        seed: Some(0),
        trace_every: 1,
        ..Parameters::default()
    };
    let mut sampler =
        BatchSampler::new(params, Annealing::Flat, sentences(&["thecat", "thedog"])).unwrap();
    assert_eq!(boundaries(&sampler), 14);

    let opts = EstimateOptions {
        maximize: true,
        ..EstimateOptions::new(1)
    };

    let mut segmentations = vec![sampler.model().segmented_lines(" ")];
    let mut entropies = vec![segmentation_entropy(sampler.sentences())];
    let mut stats: Vec<Statistics> = Vec::new();
    for _ in 0..5 {
        sampler.estimate(opts, &mut stats).unwrap();
        segmentations.push(sampler.model().segmented_lines(" "));
        entropies.push(segmentation_entropy(sampler.sentences()));
    }

    // Entropy falls with every sweep that changes the segmentation and stays put once the
    // segmentation is a fixed point.
    assert!(entropies[1] < entropies[0]);
    for i in 1..entropies.len() {
        match segmentations[i] == segmentations[i - 1] {
            true => assert_eq!(entropies[i], entropies[i - 1]),
            false => assert!(entropies[i] < entropies[i - 1]),
        }
    }
    assert_eq!(
        stats.iter().map(|s| s.entropy).collect::<Vec<_>>(),
        entropies[1..].to_vec()
    );

    assert!(boundaries(&sampler) < 14);
    assert!(sampler
        .sentences()
        .iter()
        .flat_map(|s| s.words())
        .any(|word| word.chars().count() > 1));
    assert!(sampler.sanity_check());
}

#[test]
fn batch_runs_are_reproducible() {
    let texts = [
        "thedoggie", "lookatthedoggie", "whatisthis", "thebook", "lookatthebook", "isthisit",
    ];

    let run = || {
        let params = Parameters {
            seed: Some(7),
            ..Parameters::default()
        };
        let mut sampler = BatchSampler::new(
            params,
            Annealing::stepped(20, 5.0, 1.0).unwrap(),
            sentences(&texts),
        )
        .unwrap();
        let opts = EstimateOptions {
            iters: 30,
            is_decayed: true,
            ..EstimateOptions::default()
        };
        sampler.estimate(opts, &mut LogDiagnostics).unwrap();
        sampler.model().segmented_lines(" ")
    };

    assert_eq!(run(), run());
}

#[test]
fn counts_match_segmentation_throughout() {
    let params = Parameters {
        seed: Some(3),
        ..Parameters::default()
    };
    let mut sampler = BatchSampler::new(
        params,
        Annealing::Flat,
        sentences(&["youwanttoseethebook", "lookatthebook", "thebook", "youwantit"]),
    )
    .unwrap();

    for _ in 0..20 {
        for index in 0..4 {
            sampler.estimate_sentence(index, 1.0, false).unwrap();
            let tokens = sampler
                .sentences()
                .iter()
                .map(|s| s.words().count())
                .sum::<usize>();
            assert_eq!(sampler.lexicon().total_count(), tokens);
        }
    }
    assert!(sampler.sanity_check());
}

#[test]
fn online_and_batch_agree_on_totals() {
    let texts = ["thecat", "thedog"];
    let mut online = OnlineSampler::new(
        Parameters {
            seed: Some(1),
            ..Parameters::default()
        },
        Annealing::Flat,
        sentences(&texts),
    )
    .unwrap();
    online
        .estimate(EstimateOptions::new(1), &mut LogDiagnostics)
        .unwrap();

    let tokens = online
        .sentences()
        .iter()
        .map(|s| s.words().count())
        .sum::<usize>();
    assert_eq!(online.lexicon().total_count(), tokens);
    assert_eq!(online.seen_len(), 2);
    for word in online.sentences().iter().flat_map(|s| s.words()) {
        assert!(online.lexicon().count(word) > 0);
    }
}

#[test]
fn online_forgetting_bounds_memory() {
    let texts = (0..300)
        .map(|i| ["thecat", "adog", "thedogsat", "acatsat", "thecatandthedog"][i % 5])
        .collect::<Vec<_>>();
    let params = Parameters {
        seed: Some(2),
        forget_rate: 0.25,
        forget_window: 20,
        forget_method: ForgetMethod::Proportional,
        ..Parameters::default()
    };

    let mut sampler = OnlineSampler::new(params, Annealing::Flat, sentences(&texts)).unwrap();
    sampler
        .estimate(EstimateOptions::new(2), &mut LogDiagnostics)
        .unwrap();

    assert!(sampler.seen_len() <= 20);
    assert!(sampler.lexicon().total_count() <= 20 * "thecatandthedog".len());
    assert!(sampler.sanity_check());
}

#[derive(Default)]
struct Collect {
    stats: Vec<Statistics>,
    scores: Vec<(usize, Scores)>,
}

impl Diagnostics for Collect {
    fn statistics(&mut self, stats: &Statistics) {
        self.stats.push(stats.clone());
    }

    fn scores(&mut self, iteration: usize, scores: &Scores) {
        self.scores.push((iteration, *scores));
    }
}

#[test]
fn held_out_evaluation() {
    let train = sentences(&["thedog", "thecat", "adog", "acat", "thedogandthecat"]);
    let eval = vec![
        Sentence::from_words(&["the", "dog"]).unwrap(),
        Sentence::from_words(&["a", "cat"]).unwrap(),
    ];

    let params = Parameters {
        seed: Some(4),
        eval_every: 5,
        trace_every: 5,
        ..Parameters::default()
    };
    let mut sampler = BatchSampler::new(params, Annealing::Flat, train)
        .unwrap()
        .with_eval(eval);

    let mut collect = Collect::default();
    let opts = EstimateOptions {
        iters: 10,
        eval_iters: 2,
        ..EstimateOptions::default()
    };
    sampler.estimate(opts, &mut collect).unwrap();

    assert_eq!(
        collect.stats.iter().map(|s| s.iteration).collect::<Vec<_>>(),
        vec![0, 5, 9]
    );
    assert_eq!(
        collect.scores.iter().map(|s| s.0).collect::<Vec<_>>(),
        vec![0, 5, 9]
    );
    for (_, scores) in collect.scores.iter() {
        assert!((0.0..=1.0).contains(&scores.token.fscore));
    }

    // Held-out sentences never reach the lexicon.
    let train_tokens = sampler
        .sentences()
        .iter()
        .map(|s| s.words().count())
        .sum::<usize>();
    assert_eq!(sampler.lexicon().total_count(), train_tokens);
    assert_eq!(sampler.model().eval_sentences().len(), 2);
}

#[test]
fn lexicon_dump() {
    let params = Parameters {
        init: Init::All,
        seed: Some(0),
        ..Parameters::default()
    };
    let sampler = BatchSampler::new(params, Annealing::Flat, sentences(&["abca"])).unwrap();

    let mut out = Vec::new();
    sampler.print_lexicon(&mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "a\t2\nb\t1\nc\t1\n");
}

#[test]
fn corpus_statistics_follow_the_segmentation() {
    let params = Parameters {
        init: Init::Gold,
        seed: Some(0),
        ..Parameters::default()
    };
    let train = vec![
        Sentence::from_words(&["the", "dog"]).unwrap(),
        Sentence::from_words(&["the", "cat"]).unwrap(),
        Sentence::from_words(&["dog"]).unwrap(),
    ];
    let sampler = BatchSampler::new(params, Annealing::Flat, train).unwrap();

    let summary = CorpusSummary::describe(sampler.sentences());
    assert_eq!(summary.utterances, 3);
    assert_eq!(summary.single_word_utterances, 1);
    assert_eq!(summary.tokens, sampler.lexicon().total_count());
    assert_eq!(summary.types, sampler.lexicon().types());
    assert_eq!(summary.hapax, 1);
    assert_eq!(summary.average_word_length, 3.0);

    assert_eq!(
        top_frequency(sampler.sentences(), Some(2)),
        vec![("dog", 2), ("the", 2)]
    );
}
