use loglin::train::{CumulativeL1, L1Fobos, LogisticSgd, Perceptron, StepSize, Trainer};
use loglin::{Classifier, Example, WeightVector};

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
}

/// Mean of a sequence of weight vectors
fn mean(snapshots: &[WeightVector]) -> WeightVector {
    let len = snapshots.iter().map(|w| w.len()).max().unwrap_or(0);
    let mut mean = WeightVector::new();
    for i in 0..len as i32 {
        let sum: f64 = snapshots.iter().map(|w| w.get(i)).sum();
        mean.set(i, sum / snapshots.len() as f64);
    }
    mean
}

#[test]
fn test_averaged_perceptron_is_mean_of_snapshots() {
    let instances = [
        (
            vec![
                Example::new('a', vec![0, 3]),
                Example::new('b', vec![1, 3]),
                Example::new('c', vec![2]),
            ],
            'b',
        ),
        (
            vec![
                Example::new('a', vec![0, 4]),
                Example::new('b', vec![1]),
                Example::new('c', vec![2, 4]),
            ],
            'c',
        ),
        (
            vec![
                Example::new('a', vec![0, 5]),
                Example::new('b', vec![1, 5]),
                Example::new('c', vec![2]),
            ],
            'a',
        ),
        (
            vec![
                Example::new('a', vec![3]),
                Example::new('b', vec![4, 1]),
                Example::new('c', vec![5]),
            ],
            'b',
        ),
    ];

    let mut p = Perceptron::averaged();
    let mut snapshots = vec![p.weights().clone()];
    for _ in 0..3 {
        for (candidates, gold) in &instances {
            p.update(candidates, gold);
            snapshots.push(p.weights().clone());
        }
    }
    assert_eq!(p.steps(), 12);

    let expected = mean(&snapshots);
    let averaged = p.finalize();
    for i in 0..6 {
        assert_close(averaged.get(i), expected.get(i));
    }
}

#[test]
fn test_averaged_structured_updates() {
    let mut p: Perceptron<()> = Perceptron::averaged();
    let mut snapshots = vec![p.weights().clone()];
    for (pred, gold) in [
        (vec![0, 1], vec![2]),
        (vec![2], vec![2]),
        (vec![3, 3], vec![0, 1]),
    ] {
        p.update_features(&pred, &gold);
        snapshots.push(p.weights().clone());
    }
    let expected = mean(&snapshots);
    let averaged = p.finalize();
    for i in 0..4 {
        assert_close(averaged.get(i), expected.get(i));
    }
}

#[test]
fn test_perceptron_scenario() {
    let mut p = Perceptron::new();
    let examples = vec![
        Example::new("a", vec![0, 1]),
        Example::new("b", vec![2, 3]),
    ];
    // Tie goes to "x", so "b" is promoted
    p.update(&[Example::new("x", vec![9]), Example::new("b", vec![2])], &"b");
    assert_eq!(p.weights().get(2), 1.0);

    p.update(&examples, &"a");
    let w = p.weights();
    assert_eq!(w.get(0), 1.0);
    assert_eq!(w.get(1), 1.0);
    assert_eq!(w.get(2), 0.0);
    assert_eq!(w.get(3), -1.0);
}

#[test]
fn test_cumulative_l1_strong_penalty_keeps_weights_at_zero() {
    let data = [
        (vec![Example::new(0u8, vec![0, 2]), Example::new(1u8, vec![1])], 0u8),
        (vec![Example::new(0u8, vec![0]), Example::new(1u8, vec![1, 2])], 1u8),
    ];
    let mut plain = LogisticSgd::new(StepSize::Power { a: 0.5 });
    // c / n = 1 outweighs any single gradient step
    let mut sparse =
        LogisticSgd::with_regularizer(StepSize::Power { a: 0.5 }, CumulativeL1::new(2.0, 2));
    for _ in 0..20 {
        for (candidates, gold) in &data {
            plain.update(candidates, gold);
            sparse.update(candidates, gold);
        }
    }
    assert_eq!(sparse.steps(), 40);
    assert!(plain.weights().num_active() > 0);
    assert_eq!(sparse.weights().num_active(), 0);

    let expected: f64 = (1..=40).map(|k| (k as f64).powf(-0.5)).sum();
    assert_close(sparse.regularizer().total_penalty(), expected);
}

#[test]
fn test_l1_fobos_zeroes_small_weights() {
    let mut sgd =
        LogisticSgd::with_regularizer(StepSize::Power { a: 1.0 }, L1Fobos::new(10.0, 1));
    let examples = vec![Example::new("a", vec![0]), Example::new("b", vec![1])];
    sgd.update(&examples, &"a");
    // gradient +-0.5 is below the threshold 10
    assert_eq!(sgd.weights().get(0), 0.0);
    assert_eq!(sgd.weights().get(1), 0.0);
    assert_eq!(sgd.weights().num_active(), 0);
}

#[test]
fn test_trainer_early_stop() {
    let mut trainer = Trainer::new();
    trainer
        .append(1u32, vec![Example::new(0u32, vec![0]), Example::new(1u32, vec![1])])
        .unwrap();
    trainer.params_mut().set_epsilon(0.5).unwrap();
    trainer.params_mut().set_shuffle_seed(Some(0));

    let mut p = Perceptron::new();
    let losses = trainer.train(&mut p).unwrap();
    // First epoch predicts label 0 on a tie, second epoch is correct
    assert_eq!(losses, vec![1.0, 0.0]);
    assert_eq!(p.steps(), 2);
}
