use criterion::{Criterion, black_box, criterion_group, criterion_main};
use loglin::train::{L1Fobos, LogisticSgd, Perceptron, StepSize};
use loglin::{Classifier, Example, FeatureIndexer};

const LABELS: [&str; 4] = ["DET", "NOUN", "VERB", "ADJ"];
const WORDS: [&str; 8] = ["the", "dog", "barks", "loud", "a", "cat", "sleeps", "small"];

fn candidates(indexer: &mut FeatureIndexer, i: usize) -> Vec<Example<&'static str>> {
    let word = WORDS[i % WORDS.len()];
    let prev = WORDS[(i + WORDS.len() - 1) % WORDS.len()];
    LABELS
        .iter()
        .map(|&label| {
            let features = vec![
                indexer.get_id(("bias", label)),
                indexer.get_id(("w", word, label)),
                indexer.get_id(("w-1", prev, label)),
                indexer.get_id(("suffix", &word[word.len().saturating_sub(2)..], label)),
            ];
            Example::new(label, features)
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexer");
    group.bench_function("get_id_hit", |b| {
        let mut indexer = FeatureIndexer::new();
        let _ = candidates(&mut indexer, 0);
        b.iter(|| indexer.get_id(black_box(("w", "the", "DET"))))
    });
    group.bench_function("get_id_miss", |b| {
        let mut indexer = FeatureIndexer::new();
        let mut i = 0i64;
        b.iter(|| {
            i += 1;
            indexer.get_id(black_box(("pos", i, "NOUN")))
        })
    });
    group.finish();

    let mut indexer = FeatureIndexer::new();
    let data: Vec<_> = (0..WORDS.len())
        .map(|i| (candidates(&mut indexer, i), LABELS[i % LABELS.len()]))
        .collect();

    let mut group = c.benchmark_group("update");
    group.bench_function("sgd", |b| {
        let mut sgd = LogisticSgd::new(StepSize::default());
        b.iter(|| {
            for (examples, gold) in &data {
                sgd.update(black_box(examples), gold);
            }
        })
    });
    group.bench_function("l1_fobos", |b| {
        let mut sgd = LogisticSgd::with_regularizer(StepSize::default(), L1Fobos::new(1.0, data.len()));
        b.iter(|| {
            for (examples, gold) in &data {
                sgd.update(black_box(examples), gold);
            }
        })
    });
    group.bench_function("averaged_perceptron", |b| {
        let mut p = Perceptron::averaged();
        b.iter(|| {
            for (examples, gold) in &data {
                p.update(black_box(examples), gold);
            }
        })
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
