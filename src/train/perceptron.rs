use std::marker::PhantomData;

use tracing::debug;

use crate::classifier::Classifier;
use crate::example::Example;
use crate::indexer::FeatureId;
use crate::weight::WeightVector;

/// Multiclass perceptron with optional weight averaging
///
/// The averaged variant keeps `summed_updates[f] = sum(c_t * delta_t)` where
/// `c_t` is the averaging counter at update `t`; [`finalize`](Self::finalize)
/// then returns `w - summed_updates / c`, which equals the mean of the weight
/// vectors seen during training (Collins, 2002) without storing snapshots.
#[derive(Debug, Clone)]
pub struct Perceptron<L> {
    weights: WeightVector,
    summed_updates: Option<WeightVector>,
    /// Averaging counter, starts at 1
    c: f64,
    /// Update counter
    k: u64,
    _label: PhantomData<fn(&L)>,
}

impl<L: PartialEq> Perceptron<L> {
    /// Create a plain perceptron
    pub fn new() -> Self {
        Self::with_averaging(false)
    }

    /// Create an averaged perceptron
    pub fn averaged() -> Self {
        Self::with_averaging(true)
    }

    fn with_averaging(averaged: bool) -> Self {
        Self {
            weights: WeightVector::new(),
            summed_updates: averaged.then(WeightVector::new),
            c: 1.0,
            k: 0,
            _label: PhantomData,
        }
    }

    pub fn is_averaged(&self) -> bool {
        self.summed_updates.is_some()
    }

    /// Subtract one from every feature of the candidate labeled `pred` and add
    /// one to every feature of the candidate labeled `gold`
    pub fn update_body(&mut self, examples: &[Example<L>], pred: &L, gold: &L) {
        for e in examples {
            if e.label() == pred {
                self.shift(e.features(), -1.0);
            } else if e.label() == gold {
                self.shift(e.features(), 1.0);
            }
        }
    }

    /// Structured update from raw feature lists of the predicted and gold
    /// structures
    pub fn update_features(&mut self, pred_features: &[FeatureId], gold_features: &[FeatureId]) {
        self.shift(pred_features, -1.0);
        self.shift(gold_features, 1.0);
        self.tick();
    }

    /// Final weights; for the averaged variant, the average over training
    pub fn finalize(self) -> WeightVector {
        let Perceptron {
            mut weights,
            summed_updates,
            c,
            ..
        } = self;
        if let Some(summed) = summed_updates {
            debug!(c, "averaging perceptron weights");
            for (f, s) in summed.iter() {
                weights.set(f, weights.get(f) - s / c);
            }
        }
        weights
    }

    fn shift(&mut self, features: &[FeatureId], delta: f64) {
        for &f in features {
            self.weights.add(f, delta);
        }
        if let Some(summed) = &mut self.summed_updates {
            for &f in features {
                summed.add(f, delta * self.c);
            }
        }
    }

    fn tick(&mut self) {
        self.k += 1;
        self.c += 1.0;
    }
}

impl<L: PartialEq> Default for Perceptron<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: PartialEq> Classifier<L> for Perceptron<L> {
    fn weights(&self) -> &WeightVector {
        &self.weights
    }

    fn steps(&self) -> u64 {
        self.k
    }

    fn update(&mut self, examples: &[Example<L>], gold: &L) {
        let pred = self.predict(examples).map(|(label, _)| label);
        match pred {
            Some(pred) if pred != gold => self.update_body(examples, pred, gold),
            Some(_) => {}
            // Nothing scores above -inf: promote gold only
            None => {
                for e in examples.iter().filter(|e| e.label() == gold) {
                    self.shift(e.features(), 1.0);
                }
            }
        }
        self.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perceptron_disjoint_update() {
        let mut p = Perceptron::new();
        p.update_features(&[], &[4]);
        // "b" now scores 1.0 and is predicted, gold is "a"
        let examples = vec![
            Example::new("a", vec![0, 1]),
            Example::new("b", vec![4, 5]),
        ];
        assert_eq!(p.predict(&examples).map(|(l, _)| *l), Some("b"));

        p.update(&examples, &"a");
        let w = p.weights();
        assert_eq!(w.get(0), 1.0);
        assert_eq!(w.get(1), 1.0);
        assert_eq!(w.get(4), 0.0);
        assert_eq!(w.get(5), -1.0);
        assert_eq!(w.get(2), 0.0);
        assert_eq!(w.get(3), 0.0);
        assert_eq!(p.steps(), 2);
    }

    #[test]
    fn test_perceptron_no_change_when_correct() {
        let mut p = Perceptron::new();
        let examples = vec![Example::new("a", vec![0]), Example::new("b", vec![1])];
        // Tie at 0.0: "a" is predicted, which is gold
        p.update(&examples, &"a");
        assert!(p.weights().is_empty());
        assert_eq!(p.steps(), 1);
    }

    #[test]
    fn test_structured_update() {
        let mut p: Perceptron<()> = Perceptron::new();
        p.update_features(&[0, 1, 1], &[1, 2]);
        let w = p.weights();
        assert_eq!(w.get(0), -1.0);
        assert_eq!(w.get(1), -1.0);
        assert_eq!(w.get(2), 1.0);
    }

    #[test]
    fn test_averaged_single_update() {
        let mut p: Perceptron<()> = Perceptron::averaged();
        p.update_features(&[0], &[1]);
        // Snapshots: [0, 0] and [-1, 1], mean [-0.5, 0.5]
        let w = p.finalize();
        assert_eq!(w.get(0), -0.5);
        assert_eq!(w.get(1), 0.5);
    }

    #[test]
    fn test_plain_finalize_keeps_weights() {
        let mut p: Perceptron<()> = Perceptron::new();
        assert!(!p.is_averaged());
        p.update_features(&[0], &[1]);
        let w = p.finalize();
        assert_eq!(w.as_slice(), &[-1.0, 1.0]);
    }
}
