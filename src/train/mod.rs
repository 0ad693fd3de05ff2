//! Training module for log-linear models
//!
//! This module contains the online learners, their regularizers and step-size
//! schedules, the epoch driver, and model serialization.

mod logistic_sgd;
mod model_writer;
mod params;
mod perceptron;
mod regularizer;
mod step_size;
mod trainer;

// Re-export public types
pub use self::logistic_sgd::LogisticSgd;
pub use self::model_writer::ModelWriter;
pub use self::params::{Algorithm, Learner, LearnerParams, StepSizeFunction};
pub use self::perceptron::Perceptron;
pub use self::regularizer::{CumulativeL1, L1Fobos, L2Fobos, NoPenalty, Regularizer};
pub use self::step_size::StepSize;
pub use self::trainer::{Instance, Trainer, TrainerParams};
