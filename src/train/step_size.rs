/// Step-size (learning rate) schedule as a function of the update counter `k`
///
/// Parameters are not validated here: `n = 0` makes [`StepSize::get`] fault.
/// Use [`LearnerParams`](super::LearnerParams) to build validated schedules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepSize {
    /// `a / (1 + k / n)`
    Decay { a: f64, n: usize },
    /// `a / (b + floor(k / n))`, constant within each pass over `n` instances
    Epoch { a: f64, b: f64, n: usize },
    /// `k^(-a)`
    Power { a: f64 },
}

impl StepSize {
    /// Step size at update `k`
    pub fn get(&self, k: u64) -> f64 {
        match *self {
            StepSize::Decay { a, n } => a / (1.0 + k as f64 / n as f64),
            StepSize::Epoch { a, b, n } => {
                let iter = k / n as u64;
                a / (b + iter as f64)
            }
            StepSize::Power { a } => (k as f64).powf(-a),
        }
    }
}

impl Default for StepSize {
    /// `a = 1, b = 3` over a single instance per pass
    fn default() -> Self {
        StepSize::Epoch { a: 1.0, b: 3.0, n: 1 }
    }
}
