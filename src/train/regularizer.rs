use crate::indexer::FeatureId;
use crate::weight::WeightVector;

/// Proximal step applied after each gradient update
///
/// The learner calls [`begin`](Regularizer::begin) once per update, then
/// [`apply`](Regularizer::apply) once for every feature occurrence of every
/// candidate in the update, storing the returned value as the new weight.
pub trait Regularizer {
    /// Whether this regularizer changes weights at all
    fn is_active(&self) -> bool {
        true
    }

    /// Called once per update, before any feature is visited
    fn begin(&mut self, _step_size: f64) {}

    /// New weight of `feature` given its current weight `w`
    fn apply(&mut self, feature: FeatureId, w: f64, step_size: f64) -> f64;
}

impl<R: Regularizer + ?Sized> Regularizer for Box<R> {
    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn begin(&mut self, step_size: f64) {
        (**self).begin(step_size)
    }

    fn apply(&mut self, feature: FeatureId, w: f64, step_size: f64) -> f64 {
        (**self).apply(feature, w, step_size)
    }
}

/// Plain SGD, no penalty
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPenalty;

impl Regularizer for NoPenalty {
    fn is_active(&self) -> bool {
        false
    }

    fn apply(&mut self, _feature: FeatureId, w: f64, _step_size: f64) -> f64 {
        w
    }
}

/// L1 forward-backward splitting: soft-threshold by `(c / n) * step_size`
#[derive(Debug, Clone, Copy)]
pub struct L1Fobos {
    c: f64,
    n: usize,
}

impl L1Fobos {
    /// `c` is the regularization strength, `n` the training-set size
    pub fn new(c: f64, n: usize) -> Self {
        Self { c, n }
    }

    /// Soft-threshold `w` towards zero by `t` without crossing it
    pub fn shrink(w: f64, t: f64) -> f64 {
        if w > 0.0 {
            (w - t).max(0.0)
        } else {
            (w + t).min(0.0)
        }
    }
}

impl Regularizer for L1Fobos {
    fn apply(&mut self, _feature: FeatureId, w: f64, step_size: f64) -> f64 {
        L1Fobos::shrink(w, (self.c / self.n as f64) * step_size)
    }
}

/// L2 forward-backward splitting: `w / (1 + step_size)`
#[derive(Debug, Clone, Copy, Default)]
pub struct L2Fobos;

impl Regularizer for L2Fobos {
    fn apply(&mut self, _feature: FeatureId, w: f64, step_size: f64) -> f64 {
        w / (1.0 + step_size)
    }
}

/// Cumulative L1 penalty (Tsuruoka, Tsujii and Ananiadou, 2009)
///
/// `u` is the total penalty every weight should have received so far and
/// `q[f]` the penalty actually applied to `f`. A feature only catches up with
/// `u` when it is touched again, so each update costs time proportional to
/// the active features.
#[derive(Debug, Clone)]
pub struct CumulativeL1 {
    c: f64,
    n: usize,
    u: f64,
    q: WeightVector,
}

impl CumulativeL1 {
    pub fn new(c: f64, n: usize) -> Self {
        Self {
            c,
            n,
            u: 0.0,
            q: WeightVector::new(),
        }
    }

    /// Total penalty accumulated so far
    pub fn total_penalty(&self) -> f64 {
        self.u
    }

    /// Penalty actually applied to `feature`
    pub fn applied_penalty(&self, feature: FeatureId) -> f64 {
        self.q.get(feature)
    }
}

impl Regularizer for CumulativeL1 {
    fn begin(&mut self, step_size: f64) {
        self.u += (self.c / self.n as f64) * step_size;
    }

    fn apply(&mut self, feature: FeatureId, w: f64, _step_size: f64) -> f64 {
        let z = w;
        let q = self.q.get(feature);
        let new_w = if w > 0.0 {
            (w - (self.u + q)).max(0.0)
        } else {
            (w + (self.u - q)).min(0.0)
        };
        self.q.set(feature, q + (new_w - z));
        new_w
    }
}
