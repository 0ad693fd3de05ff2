use std::marker::PhantomData;

use super::regularizer::{NoPenalty, Regularizer};
use super::step_size::StepSize;
use crate::classifier::Classifier;
use crate::example::Example;
use crate::weight::WeightVector;

/// Lower bound of an unnormalized candidate probability
const MIN_PROBABILITY: f64 = 1e-10;

/// Multiclass logistic regression (MaxEnt) trained by stochastic gradient
/// descent, with an optional proximal regularizer.
#[derive(Debug, Clone)]
pub struct LogisticSgd<L, R = NoPenalty> {
    weights: WeightVector,
    step_size: StepSize,
    regularizer: R,
    /// Update counter
    k: u64,
    _label: PhantomData<fn(&L)>,
}

impl<L: PartialEq> LogisticSgd<L> {
    /// Create an unregularized learner
    pub fn new(step_size: StepSize) -> Self {
        Self::with_regularizer(step_size, NoPenalty)
    }
}

impl<L: PartialEq, R: Regularizer> LogisticSgd<L, R> {
    pub fn with_regularizer(step_size: StepSize, regularizer: R) -> Self {
        Self::with_weights(WeightVector::new(), step_size, regularizer)
    }

    /// Continue training from existing weights
    pub fn with_weights(weights: WeightVector, step_size: StepSize, regularizer: R) -> Self {
        Self {
            weights,
            step_size,
            regularizer,
            k: 0,
            _label: PhantomData,
        }
    }

    /// Step size at the current update counter
    pub fn step_size(&self) -> f64 {
        self.step_size.get(self.k)
    }

    /// Overwrite the update counter, for debugging
    pub fn set_step(&mut self, k: u64) {
        self.k = k;
    }

    pub fn regularizer(&self) -> &R {
        &self.regularizer
    }

    pub fn weights_mut(&mut self) -> &mut WeightVector {
        &mut self.weights
    }

    pub fn into_weights(self) -> WeightVector {
        self.weights
    }

    /// Softmax distribution over the candidates.
    ///
    /// Each exponentiated score is floored at `1e-10` before normalization.
    /// `examples` is assumed to cover the output space of one instance.
    ///
    /// Scores are shifted by their maximum before exponentiation, so large
    /// scores cannot overflow to infinity.
    pub fn label_probabilities(&self, examples: &[Example<L>]) -> Vec<f64> {
        let scores: Vec<f64> = examples
            .iter()
            .map(|e| self.weights.score(e.features()))
            .collect();
        let min_log = MIN_PROBABILITY.ln();
        let shift = scores.iter().copied().fold(min_log, f64::max);
        let floor = (min_log - shift).exp();
        let mut dist: Vec<f64> = scores
            .iter()
            .map(|&s| (s - shift).exp().max(floor))
            .collect();
        let z: f64 = dist.iter().sum();
        for p in &mut dist {
            *p /= z;
        }
        dist
    }

    /// Gradient of the log-likelihood with respect to the score of a
    /// candidate with probability `p`
    pub fn derivative(label: &L, gold: &L, p: f64) -> f64 {
        if label == gold {
            1.0 - p
        } else {
            -p
        }
    }

    /// Gradient step over all candidates, without regularization
    pub fn update_body(&mut self, examples: &[Example<L>], gold: &L) {
        let dist = self.label_probabilities(examples);
        let eta = self.step_size();
        for (e, &p) in examples.iter().zip(&dist) {
            let d = Self::derivative(e.label(), gold, p);
            for &f in e.features() {
                self.weights.add(f, eta * d);
            }
        }
    }

    /// Proximal step over every feature occurrence of the candidates.
    ///
    /// A feature shared by several candidates is regularized once per
    /// occurrence.
    pub fn regularize(&mut self, examples: &[Example<L>]) {
        if !self.regularizer.is_active() {
            return;
        }
        let eta = self.step_size();
        self.regularizer.begin(eta);
        for e in examples {
            for &f in e.features() {
                let w = self.weights.get(f);
                let new_w = self.regularizer.apply(f, w, eta);
                self.weights.set(f, new_w);
            }
        }
    }
}

impl<L: PartialEq, R: Regularizer> Classifier<L> for LogisticSgd<L, R> {
    fn weights(&self) -> &WeightVector {
        &self.weights
    }

    fn steps(&self) -> u64 {
        self.k
    }

    fn update(&mut self, examples: &[Example<L>], gold: &L) {
        self.k += 1;
        self.update_body(examples, gold);
        self.regularize(examples);
    }
}
