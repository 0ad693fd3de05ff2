use crate::indexer::FeatureId;

/// One candidate of a classification instance: a feature list and its label
///
/// The features already encode the label, so each candidate label of an
/// instance gets its own `Example`.
#[derive(Debug, Clone, PartialEq)]
pub struct Example<L> {
    features: Box<[FeatureId]>,
    label: L,
}

impl<L> Example<L> {
    /// Create a new example
    pub fn new<F: Into<Box<[FeatureId]>>>(label: L, features: F) -> Self {
        Self {
            features: features.into(),
            label,
        }
    }

    /// Feature ids of this example
    pub fn features(&self) -> &[FeatureId] {
        &self.features
    }

    pub fn label(&self) -> &L {
        &self.label
    }
}

impl<L> From<(L, Vec<FeatureId>)> for Example<L> {
    fn from((label, features): (L, Vec<FeatureId>)) -> Self {
        Self::new(label, features)
    }
}
