//! Feature schema and input record structures

use crate::error::{LoadError, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Ordered feature names a model expects, fixed when the model is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// Build a schema, rejecting empty, blank or duplicate names
    pub fn new(names: Vec<String>) -> Result<Self, LoadError> {
        if names.is_empty() {
            return Err(LoadError::Incompatible(
                "feature list is empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if name.trim().is_empty() {
                return Err(LoadError::Incompatible(
                    "feature names must not be blank".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(LoadError::Incompatible(format!(
                    "duplicate feature name {name}"
                )));
            }
        }

        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// One user-submitted set of feature values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputRecord {
    values: BTreeMap<String, f64>,
}

impl InputRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, builder style
    pub fn with(mut self, feature: impl Into<String>, value: f64) -> Self {
        self.values.insert(feature.into(), value);
        self
    }

    pub fn insert(&mut self, feature: impl Into<String>, value: f64) {
        self.values.insert(feature.into(), value);
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.values.get(feature).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Lay out the values in schema order.
    ///
    /// The key set must match the schema exactly and every value must be
    /// finite. Nothing is defaulted.
    pub fn to_vector(&self, schema: &FeatureSchema) -> Result<Vec<f64>, ValidationError> {
        if let Some(extra) = self.values.keys().find(|k| !schema.contains(k)) {
            return Err(ValidationError::UnknownFeature(extra.clone()));
        }

        schema
            .iter()
            .map(|name| match self.values.get(name) {
                None => Err(ValidationError::MissingFeature(name.to_string())),
                Some(v) if !v.is_finite() => Err(ValidationError::NotFinite(name.to_string())),
                Some(&v) => Ok(v),
            })
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for InputRecord {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec!["Glucose".to_string(), "BMI".to_string()]).unwrap()
    }

    #[test]
    fn test_schema_rejects_duplicates_and_empty() {
        assert!(FeatureSchema::new(vec![]).is_err());
        assert!(FeatureSchema::new(vec!["Age".to_string(), "Age".to_string()]).is_err());
        assert!(FeatureSchema::new(vec!["  ".to_string()]).is_err());
    }

    #[test]
    fn test_vector_follows_schema_order() {
        let record = InputRecord::new().with("BMI", 30.0).with("Glucose", 150.0);
        assert_eq!(record.to_vector(&schema()).unwrap(), vec![150.0, 30.0]);
    }

    #[test]
    fn test_missing_feature_is_rejected() {
        let record = InputRecord::new().with("Glucose", 150.0);
        assert_eq!(
            record.to_vector(&schema()),
            Err(ValidationError::MissingFeature("BMI".to_string()))
        );
    }

    #[test]
    fn test_extra_feature_is_rejected() {
        let record = InputRecord::new()
            .with("Glucose", 150.0)
            .with("BMI", 30.0)
            .with("Insulin", 80.0);
        assert_eq!(
            record.to_vector(&schema()),
            Err(ValidationError::UnknownFeature("Insulin".to_string()))
        );
    }

    #[test]
    fn test_non_finite_value_is_rejected() {
        let record = InputRecord::new().with("Glucose", f64::NAN).with("BMI", 30.0);
        assert_eq!(
            record.to_vector(&schema()),
            Err(ValidationError::NotFinite("Glucose".to_string()))
        );
    }

    #[test]
    fn test_record_deserializes_from_map() {
        let record: InputRecord =
            serde_json::from_str(r#"{"Glucose": 150.0, "BMI": 30.0}"#).unwrap();
        assert_eq!(record.get("Glucose"), Some(150.0));
        assert_eq!(record.len(), 2);
    }
}
