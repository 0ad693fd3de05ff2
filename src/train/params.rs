use std::fmt;
use std::io;
use std::str::FromStr;

use super::logistic_sgd::LogisticSgd;
use super::perceptron::Perceptron;
use super::regularizer::{CumulativeL1, L1Fobos, L2Fobos, NoPenalty, Regularizer};
use super::step_size::StepSize;
use crate::classifier::Classifier;
use crate::example::Example;
use crate::weight::WeightVector;

fn invalid_input(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg.into())
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> io::Result<T> {
    value
        .parse()
        .map_err(|_| invalid_input(format!("invalid value for {}: {}", name, value)))
}

/// Learning algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Logistic regression, plain SGD
    Sgd,
    /// Logistic regression, L1 forward-backward splitting
    L1Fobos,
    /// Logistic regression, L2 forward-backward splitting
    L2Fobos,
    /// Logistic regression, SGD with cumulative L1 penalty
    CumulativeL1,
    Perceptron,
    AveragedPerceptron,
}

impl Algorithm {
    fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sgd => "sgd",
            Algorithm::L1Fobos => "l1_fobos",
            Algorithm::L2Fobos => "l2_fobos",
            Algorithm::CumulativeL1 => "cumulative_l1",
            Algorithm::Perceptron => "perceptron",
            Algorithm::AveragedPerceptron => "averaged_perceptron",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sgd" => Ok(Algorithm::Sgd),
            "l1_fobos" => Ok(Algorithm::L1Fobos),
            "l2_fobos" => Ok(Algorithm::L2Fobos),
            "cumulative_l1" => Ok(Algorithm::CumulativeL1),
            "perceptron" => Ok(Algorithm::Perceptron),
            "averaged_perceptron" => Ok(Algorithm::AveragedPerceptron),
            _ => Err(invalid_input(format!("unknown algorithm: {}", s))),
        }
    }
}

/// Step-size schedule selector, see [`StepSize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSizeFunction {
    /// [`StepSize::Decay`]
    StepSize1,
    /// [`StepSize::Epoch`]
    StepSize2,
    /// [`StepSize::Power`]
    StepSize3,
}

impl StepSizeFunction {
    fn as_str(&self) -> &'static str {
        match self {
            StepSizeFunction::StepSize1 => "step_size1",
            StepSizeFunction::StepSize2 => "step_size2",
            StepSizeFunction::StepSize3 => "step_size3",
        }
    }
}

impl fmt::Display for StepSizeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepSizeFunction {
    type Err = io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "step_size1" => Ok(StepSizeFunction::StepSize1),
            "step_size2" => Ok(StepSizeFunction::StepSize2),
            "step_size3" => Ok(StepSizeFunction::StepSize3),
            _ => Err(invalid_input(format!("unknown step size function: {}", s))),
        }
    }
}

/// Learner configuration.
///
/// Every setter validates its input, so a [`Learner`] built from these
/// parameters never divides by zero.
#[derive(Debug, Clone)]
pub struct LearnerParams {
    algorithm: Algorithm,
    step_size_function: StepSizeFunction,
    a: f64,
    b: f64,
    c: f64,
    num_instances: usize,
}

impl Default for LearnerParams {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Sgd,
            step_size_function: StepSizeFunction::StepSize2,
            a: 1.0,
            b: 3.0,
            c: 1.0,
            num_instances: 1,
        }
    }
}

impl LearnerParams {
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = algorithm;
    }

    pub fn step_size_function(&self) -> StepSizeFunction {
        self.step_size_function
    }

    pub fn set_step_size_function(&mut self, function: StepSizeFunction) {
        self.step_size_function = function;
    }

    pub fn a(&self) -> f64 {
        self.a
    }

    pub fn set_a(&mut self, a: f64) -> io::Result<()> {
        if !(a > 0.0) {
            return Err(invalid_input("a must be positive"));
        }
        self.a = a;
        Ok(())
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn set_b(&mut self, b: f64) -> io::Result<()> {
        if !(b > 0.0) {
            return Err(invalid_input("b must be positive"));
        }
        self.b = b;
        Ok(())
    }

    /// Regularization strength
    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn set_c(&mut self, c: f64) -> io::Result<()> {
        if !(c >= 0.0) {
            return Err(invalid_input("c must be non-negative"));
        }
        self.c = c;
        Ok(())
    }

    /// Training-set size `N` used by the schedules and the L1 penalties
    pub fn num_instances(&self) -> usize {
        self.num_instances
    }

    pub fn set_num_instances(&mut self, num_instances: usize) -> io::Result<()> {
        if num_instances == 0 {
            return Err(invalid_input("num_instances must be positive"));
        }
        self.num_instances = num_instances;
        Ok(())
    }

    /// Set a parameter by name from its string form
    pub fn set(&mut self, name: &str, value: &str) -> io::Result<()> {
        match name {
            "algorithm" => self.set_algorithm(value.parse()?),
            "step_size" => self.set_step_size_function(value.parse()?),
            "a" => self.set_a(parse_value(name, value)?)?,
            "b" => self.set_b(parse_value(name, value)?)?,
            "c" => self.set_c(parse_value(name, value)?)?,
            "num_instances" => self.set_num_instances(parse_value(name, value)?)?,
            _ => return Err(invalid_input(format!("unknown parameter: {}", name))),
        }
        Ok(())
    }

    /// Get a parameter by name in its string form
    pub fn get(&self, name: &str) -> io::Result<String> {
        match name {
            "algorithm" => Ok(self.algorithm.to_string()),
            "step_size" => Ok(self.step_size_function.to_string()),
            "a" => Ok(self.a.to_string()),
            "b" => Ok(self.b.to_string()),
            "c" => Ok(self.c.to_string()),
            "num_instances" => Ok(self.num_instances.to_string()),
            _ => Err(invalid_input(format!("unknown parameter: {}", name))),
        }
    }

    /// The configured step-size schedule
    pub fn step_size(&self) -> StepSize {
        match self.step_size_function {
            StepSizeFunction::StepSize1 => StepSize::Decay {
                a: self.a,
                n: self.num_instances,
            },
            StepSizeFunction::StepSize2 => StepSize::Epoch {
                a: self.a,
                b: self.b,
                n: self.num_instances,
            },
            StepSizeFunction::StepSize3 => StepSize::Power { a: self.a },
        }
    }

    /// Build a fresh learner
    pub fn build<L: PartialEq>(&self) -> Learner<L> {
        let step_size = self.step_size();
        let (c, n) = (self.c, self.num_instances);
        let regularizer: Box<dyn Regularizer> = match self.algorithm {
            Algorithm::Perceptron => return Learner::Perceptron(Perceptron::new()),
            Algorithm::AveragedPerceptron => return Learner::Perceptron(Perceptron::averaged()),
            Algorithm::Sgd => Box::new(NoPenalty),
            Algorithm::L1Fobos => Box::new(L1Fobos::new(c, n)),
            Algorithm::L2Fobos => Box::new(L2Fobos),
            Algorithm::CumulativeL1 => Box::new(CumulativeL1::new(c, n)),
        };
        Learner::Logistic(LogisticSgd::with_regularizer(step_size, regularizer))
    }
}

/// A classifier chosen at run time from [`LearnerParams`]
pub enum Learner<L> {
    Logistic(LogisticSgd<L, Box<dyn Regularizer>>),
    Perceptron(Perceptron<L>),
}

impl<L: PartialEq> Learner<L> {
    /// Final weights for inference; averages perceptron weights if configured
    pub fn into_weights(self) -> WeightVector {
        match self {
            Learner::Logistic(sgd) => sgd.into_weights(),
            Learner::Perceptron(p) => p.finalize(),
        }
    }
}

impl<L> fmt::Debug for Learner<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Learner::Logistic(_) => f.write_str("Learner::Logistic"),
            Learner::Perceptron(_) => f.write_str("Learner::Perceptron"),
        }
    }
}

impl<L: PartialEq> Classifier<L> for Learner<L> {
    fn weights(&self) -> &WeightVector {
        match self {
            Learner::Logistic(sgd) => sgd.weights(),
            Learner::Perceptron(p) => p.weights(),
        }
    }

    fn steps(&self) -> u64 {
        match self {
            Learner::Logistic(sgd) => sgd.steps(),
            Learner::Perceptron(p) => p.steps(),
        }
    }

    fn update(&mut self, examples: &[Example<L>], gold: &L) {
        match self {
            Learner::Logistic(sgd) => sgd.update(examples, gold),
            Learner::Perceptron(p) => p.update(examples, gold),
        }
    }
}
