use crate::example::Example;
use crate::indexer::FeatureId;
use crate::weight::WeightVector;

/// Pick the highest scoring candidate.
///
/// Candidates are scanned in input order with a strict comparison, so on a
/// tie the first candidate wins. Returns `None` if `examples` is empty or no
/// candidate scores above negative infinity.
pub fn argmax<'e, L>(weights: &WeightVector, examples: &'e [Example<L>]) -> Option<(&'e L, f64)> {
    let mut max = f64::NEG_INFINITY;
    let mut arg_max = None;
    for e in examples {
        let s = weights.score(e.features());
        if s > max {
            max = s;
            arg_max = Some(e.label());
        }
    }
    arg_max.map(|label| (label, max))
}

/// Online multiclass classifier over sparse binary features
pub trait Classifier<L: PartialEq> {
    /// Current weights
    fn weights(&self) -> &WeightVector;

    /// Number of `update` calls so far
    fn steps(&self) -> u64;

    /// Learn from one instance given its candidates and the gold label
    fn update(&mut self, examples: &[Example<L>], gold: &L);

    /// Sum of the weights of `features`
    fn score(&self, features: &[FeatureId]) -> f64 {
        self.weights().score(features)
    }

    /// Arg-max label among `examples` and its score
    fn predict<'e>(&self, examples: &'e [Example<L>]) -> Option<(&'e L, f64)> {
        argmax(self.weights(), examples)
    }
}
