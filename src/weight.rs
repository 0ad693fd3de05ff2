use crate::indexer::FeatureId;

const DEFAULT_CAPACITY: usize = 1000;

/// A lazily growing weight vector indexed by feature id
///
/// Reading an id that was never written, including negative ids produced for
/// features unknown to a locked indexer, yields `0.0`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightVector {
    weights: Vec<f64>,
}

impl WeightVector {
    /// Create a new empty weight vector
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            weights: Vec::with_capacity(capacity),
        }
    }

    /// Current storage extent, not the number of non-zero weights
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weight of a feature, `0.0` when negative or beyond the extent
    #[inline]
    pub fn get(&self, id: FeatureId) -> f64 {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.weights.get(i).copied())
            .unwrap_or(0.0)
    }

    /// Set the weight of a feature, growing the storage with zeros if needed.
    ///
    /// Negative ids carry no weight and are ignored.
    pub fn set(&mut self, id: FeatureId, value: f64) {
        let Ok(i) = usize::try_from(id) else {
            return;
        };
        if i >= self.weights.len() {
            self.weights.resize(i + 1, 0.0);
        }
        self.weights[i] = value;
    }

    /// Add `delta` to the weight of a feature
    #[inline]
    pub fn add(&mut self, id: FeatureId, delta: f64) {
        self.set(id, self.get(id) + delta);
    }

    /// Sum of the weights of the given features
    pub fn score(&self, features: &[FeatureId]) -> f64 {
        let mut score = 0.0;
        for &f in features {
            score += self.get(f);
        }
        score
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    /// Iterate over all (id, weight) pairs within the extent
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, f64)> + '_ {
        self.weights
            .iter()
            .enumerate()
            .map(|(id, &w)| (id as FeatureId, w))
    }

    /// Number of non-zero weights
    pub fn num_active(&self) -> usize {
        self.weights.iter().filter(|&&w| w != 0.0).count()
    }
}

impl From<Vec<f64>> for WeightVector {
    fn from(weights: Vec<f64>) -> Self {
        Self { weights }
    }
}
