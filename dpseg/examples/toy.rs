//! Segment the built-in corpus with both strategies
//!
//! Run with `RUST_LOG=info` to see per-iteration statistics.

use std::io;

use dpseg::test_cases::sentences;
use dpseg::{
    segmentation_entropy, top_frequency, Annealing, BatchSampler, CorpusSummary,
    EstimateOptions, ForgetMethod, Init, LogDiagnostics, OnlineSampler, Parameters, Sampler,
    Scores,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let params = Parameters {
        seed: Some(1),
        init: Init::Random(0.5),
        hypersample: true,
        ..Parameters::default()
    };

    let mut batch = BatchSampler::new(
        params.clone(),
        Annealing::stepped(100, 10.0, 1.0)?,
        sentences(),
    )?;
    let opts = EstimateOptions {
        iters: 150,
        is_decayed: true,
        ..EstimateOptions::default()
    };
    batch.estimate(opts, &mut LogDiagnostics)?;

    for line in batch.model().segmented_lines(" ").iter().take(10) {
        println!("{}", line);
    }
    println!("batch: {}", Scores::compute(batch.sentences()));
    println!(
        "batch: {} nse {:.4}",
        CorpusSummary::describe(batch.sentences()),
        segmentation_entropy(batch.sentences())
    );
    for (word, count) in top_frequency(batch.sentences(), Some(5)) {
        println!("{}\t{}", word, count);
    }

    let online_params = Parameters {
        forget_rate: 0.1,
        forget_window: 20,
        forget_method: ForgetMethod::Oldest,
        ..params
    };
    let mut online = OnlineSampler::new(online_params, Annealing::Flat, sentences())?;
    online.estimate(EstimateOptions::new(5), &mut LogDiagnostics)?;
    println!("online: {}", Scores::compute(online.sentences()));

    let stdout = io::stdout();
    batch.print_lexicon(&mut stdout.lock())?;
    Ok(())
}
