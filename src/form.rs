//! Form field policy: bounds, step and defaults for each feature input.
//!
//! The bounds are an input-validation policy of the form, not a constraint
//! of the classifier. Raw submissions are parsed and checked here before
//! they reach the prediction pipeline.

use crate::error::ValidationError;
use crate::types::record::{FeatureSchema, InputRecord};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-feature override of the global policy
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldOverride {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub default: Option<f64>,
}

/// Resolved settings of one numeric input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
}

impl FieldSpec {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Bounds and defaults applied to every form input
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FormPolicy {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Default for features not matched by a hint or override
    pub default_value: f64,
    /// Substring of a feature name -> default value
    pub default_hints: HashMap<String, f64>,
    /// Feature name -> override
    pub features: HashMap<String, FieldOverride>,
}

impl Default for FormPolicy {
    fn default() -> Self {
        let mut default_hints = HashMap::new();
        default_hints.insert("BMI".to_string(), 25.0);

        Self {
            min: 0.0,
            max: 500.0,
            step: 0.1,
            default_value: 0.0,
            default_hints,
            features: HashMap::new(),
        }
    }
}

impl FormPolicy {
    /// Check that every bound is usable and every configured default lies
    /// within the bounds it applies to
    pub fn check(&self) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            bail!("form bounds [{}, {}] are invalid", self.min, self.max);
        }
        if !(self.step > 0.0) {
            bail!("form step must be positive");
        }

        let within = |value: f64| value >= self.min && value <= self.max;
        if !within(self.default_value) {
            bail!(
                "default value {} lies outside [{}, {}]",
                self.default_value,
                self.min,
                self.max
            );
        }
        for (hint, &value) in &self.default_hints {
            if !within(value) {
                bail!(
                    "default {} for {} lies outside [{}, {}]",
                    value,
                    hint,
                    self.min,
                    self.max
                );
            }
        }

        for (name, over) in &self.features {
            let field = self.field(name);
            if !(field.min.is_finite() && field.max.is_finite()) || field.min > field.max {
                bail!("bounds [{}, {}] for {} are invalid", field.min, field.max, name);
            }
            if !(field.step > 0.0) {
                bail!("step for {} must be positive", name);
            }
            if let Some(default) = over.default {
                if !field.contains(default) {
                    bail!("default {} for {} lies outside its bounds", default, name);
                }
            }
        }
        Ok(())
    }

    fn find_override(&self, feature: &str) -> Option<&FieldOverride> {
        self.features.get(feature).or_else(|| {
            self.features
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(feature))
                .map(|(_, o)| o)
        })
    }

    /// Default value from the first matching hint, longest hint first
    fn hinted_default(&self, feature: &str) -> Option<f64> {
        let lowered = feature.to_ascii_lowercase();
        let mut hints: Vec<(&String, &f64)> = self.default_hints.iter().collect();
        hints.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));
        hints
            .into_iter()
            .find(|(hint, _)| lowered.contains(&hint.to_ascii_lowercase()))
            .map(|(_, &value)| value)
    }

    /// Resolve the settings of one feature input.
    ///
    /// A default inherited from a hint or the global default is clamped into
    /// bounds narrowed by an override.
    pub fn field(&self, feature: &str) -> FieldSpec {
        let over = self.find_override(feature);
        let min = over.and_then(|o| o.min).unwrap_or(self.min);
        let max = over.and_then(|o| o.max).unwrap_or(self.max);
        let step = over.and_then(|o| o.step).unwrap_or(self.step);

        let default = match over.and_then(|o| o.default) {
            Some(value) => value,
            None => self
                .hinted_default(feature)
                .unwrap_or(self.default_value)
                .max(min)
                .min(max),
        };

        FieldSpec {
            name: feature.to_string(),
            min,
            max,
            step,
            default,
        }
    }

    /// Field settings for every feature, in schema order
    pub fn fields(&self, schema: &FeatureSchema) -> Vec<FieldSpec> {
        schema.iter().map(|name| self.field(name)).collect()
    }

    /// Parse raw form values into a record, rejecting the whole submission on
    /// the first missing, unknown, unparsable or out-of-bounds value
    pub fn parse(
        &self,
        schema: &FeatureSchema,
        raw: &HashMap<String, String>,
    ) -> Result<InputRecord, ValidationError> {
        let mut unknown: Vec<&String> = raw.keys().filter(|k| !schema.contains(k)).collect();
        unknown.sort();
        if let Some(name) = unknown.first() {
            return Err(ValidationError::UnknownFeature((*name).clone()));
        }

        let mut record = InputRecord::new();
        for name in schema.iter() {
            let text = raw
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ValidationError::MissingFeature(name.to_string()))?;

            let value: f64 = text.parse().map_err(|_| ValidationError::NotANumber {
                feature: name.to_string(),
                value: text.to_string(),
            })?;

            record.insert(name, value);
        }

        self.validate(schema, &record)?;
        Ok(record)
    }

    /// Check an already-numeric record against the schema and the bounds
    pub fn validate(&self, schema: &FeatureSchema, record: &InputRecord) -> Result<(), ValidationError> {
        let values = record.to_vector(schema)?;

        for (name, value) in schema.iter().zip(values) {
            let field = self.field(name);
            if !field.contains(value) {
                return Err(ValidationError::OutOfBounds {
                    feature: name.to_string(),
                    value,
                    min: field.min,
                    max: field.max,
                });
            }
        }
        Ok(())
    }
}
