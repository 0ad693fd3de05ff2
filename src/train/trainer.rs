use std::io;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::classifier::Classifier;
use crate::example::Example;

/// One training instance: all candidates of the output space and the gold label
#[derive(Debug, Clone)]
pub struct Instance<L> {
    pub gold: L,
    pub candidates: Vec<Example<L>>,
}

/// Epoch driver parameters.
#[derive(Debug, Clone)]
pub struct TrainerParams {
    max_iterations: usize,
    epsilon: f64,
    shuffle_seed: Option<u64>,
}

impl Default for TrainerParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            epsilon: 0.0,
            shuffle_seed: None,
        }
    }
}

impl TrainerParams {
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) -> io::Result<()> {
        if max_iterations < 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "max_iterations must be at least 1",
            ));
        }
        self.max_iterations = max_iterations;
        Ok(())
    }

    /// Training stops once the error rate of an epoch falls below `epsilon`
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) -> io::Result<()> {
        if !(epsilon >= 0.0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "epsilon must be non-negative",
            ));
        }
        self.epsilon = epsilon;
        Ok(())
    }

    pub fn shuffle_seed(&self) -> Option<u64> {
        self.shuffle_seed
    }

    pub fn set_shuffle_seed(&mut self, seed: Option<u64>) {
        self.shuffle_seed = seed;
    }

    /// Set a parameter by name from its string form
    pub fn set(&mut self, name: &str, value: &str) -> io::Result<()> {
        let invalid = || {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid value for {}: {}", name, value),
            )
        };
        match name {
            "max_iterations" => self.set_max_iterations(value.parse().map_err(|_| invalid())?),
            "epsilon" => self.set_epsilon(value.parse().map_err(|_| invalid())?),
            "shuffle_seed" => {
                let seed = if value.is_empty() {
                    None
                } else {
                    Some(value.parse().map_err(|_| invalid())?)
                };
                self.set_shuffle_seed(seed);
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unknown parameter: {}", name),
            )),
        }
    }

    /// Get a parameter by name in its string form; an unset seed is empty
    pub fn get(&self, name: &str) -> io::Result<String> {
        match name {
            "max_iterations" => Ok(self.max_iterations.to_string()),
            "epsilon" => Ok(self.epsilon.to_string()),
            "shuffle_seed" => Ok(self
                .shuffle_seed
                .map(|seed| seed.to_string())
                .unwrap_or_default()),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unknown parameter: {}", name),
            )),
        }
    }
}

/// Online training loop over a fixed set of instances
#[derive(Debug)]
pub struct Trainer<L> {
    instances: Vec<Instance<L>>,
    params: TrainerParams,
}

impl<L: PartialEq> Trainer<L> {
    /// Create a new trainer
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
            params: TrainerParams::default(),
        }
    }

    /// Get training parameters
    pub fn params(&self) -> &TrainerParams {
        &self.params
    }

    /// Get training parameters for mutation
    pub fn params_mut(&mut self) -> &mut TrainerParams {
        &mut self.params
    }

    /// Number of training instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> &[Instance<L>] {
        &self.instances
    }

    /// Append a training instance.
    ///
    /// Exactly one candidate must carry the gold label.
    pub fn append(&mut self, gold: L, candidates: Vec<Example<L>>) -> io::Result<()> {
        if candidates.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty candidate lists are not allowed",
            ));
        }
        let num_gold = candidates.iter().filter(|e| *e.label() == gold).count();
        if num_gold != 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "exactly one candidate must carry the gold label, found {}",
                    num_gold
                ),
            ));
        }
        self.instances.push(Instance { gold, candidates });
        Ok(())
    }

    /// Clear all training data
    pub fn clear(&mut self) {
        self.instances.clear();
    }

    /// Run training epochs over the instances in shuffled order.
    ///
    /// Returns the error rate of each epoch, counted from the predictions
    /// made before each update.
    pub fn train<C: Classifier<L>>(&self, classifier: &mut C) -> io::Result<Vec<f64>> {
        if self.instances.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no training data",
            ));
        }

        let mut order: Vec<usize> = (0..self.instances.len()).collect();
        let mut rng = match self.params.shuffle_seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => {
                let mut thread_rng = rand::rng();
                StdRng::from_rng(&mut thread_rng)
            }
        };
        let num_instances = self.instances.len() as f64;

        info!(
            instances = self.instances.len(),
            max_iterations = self.params.max_iterations(),
            "training"
        );

        let mut losses = Vec::new();
        for epoch in 0..self.params.max_iterations() {
            order.shuffle(&mut rng);

            let mut wrong = 0usize;
            for &idx in &order {
                let inst = &self.instances[idx];
                let correct = matches!(
                    classifier.predict(&inst.candidates),
                    Some((pred, _)) if *pred == inst.gold
                );
                if !correct {
                    wrong += 1;
                }
                classifier.update(&inst.candidates, &inst.gold);
            }

            let error_rate = wrong as f64 / num_instances;
            info!(
                epoch = epoch + 1,
                error_rate,
                features = classifier.weights().num_active(),
                "epoch finished"
            );
            losses.push(error_rate);

            if error_rate < self.params.epsilon() {
                info!(epoch = epoch + 1, "converged");
                break;
            }
        }

        Ok(losses)
    }

    /// Error rate of `classifier` on `instances`, without updating it
    pub fn evaluate<C: Classifier<L>>(classifier: &C, instances: &[Instance<L>]) -> f64 {
        if instances.is_empty() {
            return 0.0;
        }
        let wrong = instances
            .iter()
            .filter(|inst| {
                !matches!(
                    classifier.predict(&inst.candidates),
                    Some((pred, _)) if *pred == inst.gold
                )
            })
            .count();
        wrong as f64 / instances.len() as f64
    }
}

impl<L: PartialEq> Default for Trainer<L> {
    fn default() -> Self {
        Self::new()
    }
}
