//! Intent specification types.
//!
//! An [`IntentSpec`] is the structured description of an intent published to
//! the intent service over the bus: a name plus required / at-least-one /
//! optional keyword lists. Specs are produced either literally or through
//! [`IntentBuilder`]; both routes go through [`IntentSpec::validate`], so an
//! unbuildable specification is rejected synchronously at registration time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while building or validating an intent specification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    /// The intent has no name.
    #[error("intent specification has an empty name")]
    EmptyName,

    /// A keyword entry is an empty string.
    #[error("intent '{intent}' contains an empty keyword")]
    EmptyKeyword {
        /// Name of the offending intent.
        intent: String,
    },

    /// An `at_least_one` group has no alternatives.
    #[error("intent '{intent}' has an empty at-least-one group")]
    EmptyGroup {
        /// Name of the offending intent.
        intent: String,
    },
}

/// A built intent specification.
///
/// The wire shape matches the `register_intent` payload: `name`, `requires`,
/// `at_least_one`, `optional`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentSpec {
    /// Local intent name; namespaced with the skill id before publication.
    pub name: String,
    /// Keywords that must all be present for the intent to match.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Groups of alternatives; one keyword from each group must be present.
    #[serde(default)]
    pub at_least_one: Vec<Vec<String>>,
    /// Keywords that refine the match but are not required.
    #[serde(default)]
    pub optional: Vec<String>,
}

impl IntentSpec {
    /// Creates a spec with the given name and no keywords.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Checks the structural invariants of the specification.
    pub fn validate(&self) -> Result<(), IntentError> {
        if self.name.is_empty() {
            return Err(IntentError::EmptyName);
        }
        let empty_keyword = |kw: &String| kw.is_empty();
        if self.requires.iter().any(empty_keyword) || self.optional.iter().any(empty_keyword) {
            return Err(IntentError::EmptyKeyword {
                intent: self.name.clone(),
            });
        }
        for group in &self.at_least_one {
            if group.is_empty() {
                return Err(IntentError::EmptyGroup {
                    intent: self.name.clone(),
                });
            }
            if group.iter().any(empty_keyword) {
                return Err(IntentError::EmptyKeyword {
                    intent: self.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`IntentSpec`].
///
/// # Example
///
/// ```rust,ignore
/// let intent = IntentBuilder::new("weather")
///     .require("WeatherKeyword")
///     .one_of(["Today", "Tomorrow"])
///     .optionally("Location")
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct IntentBuilder {
    spec: IntentSpec,
}

impl IntentBuilder {
    /// Starts a builder for an intent with the given local name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            spec: IntentSpec::new(name),
        }
    }

    /// Adds a required keyword.
    pub fn require(mut self, keyword: impl Into<String>) -> Self {
        self.spec.requires.push(keyword.into());
        self
    }

    /// Adds a group of alternatives, at least one of which must match.
    pub fn one_of<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec
            .at_least_one
            .push(keywords.into_iter().map(Into::into).collect());
        self
    }

    /// Adds an optional keyword.
    pub fn optionally(mut self, keyword: impl Into<String>) -> Self {
        self.spec.optional.push(keyword.into());
        self
    }

    /// Validates and returns the finished specification.
    pub fn build(self) -> Result<IntentSpec, IntentError> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}

/// Conversion accepted by intent registration: a finished spec or a builder.
///
/// Both routes validate, so an invalid specification is always rejected
/// synchronously at the registration call site.
pub trait IntoIntent {
    /// Validates and yields the finished specification.
    fn into_intent(self) -> Result<IntentSpec, IntentError>;
}

impl IntoIntent for IntentSpec {
    fn into_intent(self) -> Result<IntentSpec, IntentError> {
        self.validate()?;
        Ok(self)
    }
}

impl IntoIntent for IntentBuilder {
    fn into_intent(self) -> Result<IntentSpec, IntentError> {
        self.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_validated_spec() {
        let spec = IntentBuilder::new("weather")
            .require("WeatherKeyword")
            .one_of(["Today", "Tomorrow"])
            .optionally("Location")
            .build()
            .unwrap();

        assert_eq!(spec.name, "weather");
        assert_eq!(spec.requires, vec!["WeatherKeyword"]);
        assert_eq!(spec.at_least_one, vec![vec!["Today", "Tomorrow"]]);
        assert_eq!(spec.optional, vec!["Location"]);
    }

    #[test]
    fn empty_name_is_rejected() {
        assert_eq!(
            IntentBuilder::new("").require("Keyword").build(),
            Err(IntentError::EmptyName)
        );
    }

    #[test]
    fn empty_alternative_group_is_rejected() {
        let err = IntentBuilder::new("weather")
            .one_of(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            IntentError::EmptyGroup {
                intent: "weather".into()
            }
        );
    }

    #[test]
    fn wire_shape_matches_registration_payload() {
        let spec = IntentBuilder::new("weather")
            .require("WeatherKeyword")
            .build()
            .unwrap();
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["name"], "weather");
        assert_eq!(value["requires"][0], "WeatherKeyword");
        assert!(value["at_least_one"].as_array().unwrap().is_empty());
    }
}
