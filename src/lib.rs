//! Feature indexing and online log-linear learners
//!
//! This library maps composite feature keys to dense integer ids and trains
//! linear classifiers over those ids: logistic regression by SGD (with
//! optional FOBOS or cumulative L1 regularization) and the plain or averaged
//! perceptron.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use loglin::train::{LearnerParams, ModelWriter, Trainer};
//! use loglin::{Example, FeatureIndexer};
//! use std::path::Path;
//!
//! let mut indexer = FeatureIndexer::new();
//! let mut candidates = |word: &str| -> Vec<Example<&'static str>> {
//!     ["sunny", "rainy"]
//!         .into_iter()
//!         .map(|label| Example::new(label, vec![indexer.get_id((word, label))]))
//!         .collect()
//! };
//!
//! let mut trainer = Trainer::new();
//! trainer.append("sunny", candidates("walk"))?;
//! trainer.append("rainy", candidates("shop"))?;
//!
//! let mut params = LearnerParams::default();
//! params.set("algorithm", "l2_fobos")?;
//! params.set("num_instances", "2")?;
//! let mut learner = params.build();
//! trainer.train(&mut learner)?;
//!
//! ModelWriter::new().write(Path::new("model.bin"), &indexer, &learner.into_weights())?;
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! ## Prediction
//!
//! ```no_run
//! use loglin::{Example, Model};
//!
//! let model_data = std::fs::read("model.bin")?;
//! let model = Model::new(&model_data)?;
//!
//! let candidates: Vec<Example<&str>> = ["sunny", "rainy"]
//!     .into_iter()
//!     .map(|label| Example::new(label, vec![model.feature_id(("walk", label))]))
//!     .collect();
//! let (label, _score) = model.predict(&candidates).unwrap();
//! assert_eq!(*label, "sunny");
//! # Ok::<(), std::io::Error>(())
//! ```

mod atom;
mod classifier;
mod example;
mod indexer;
mod model;
mod weight;

/// Learners, training loop and model serialization
pub mod train;

// Re-export main types
pub use self::atom::Atom;
pub use self::classifier::{argmax, Classifier};
pub use self::example::Example;
pub use self::indexer::{
    CompositeKey, FeatureId, FeatureIndexer, IntoAtoms, LockedIndexerError, KEY_SEPARATOR,
    MAX_ARITY, UNKNOWN_FEATURE,
};
pub use self::model::{Model, ModelFlags};
pub use self::weight::WeightVector;

// Re-export training types for convenience
pub use self::train::{Learner, LearnerParams, Trainer};
