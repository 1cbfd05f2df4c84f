//! Training configuration submitted by clients.
//!
//! Numeric fields stay strings on the wire because the trainer coerces
//! them itself; here we only check that they parse to positive numbers.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::CoreError;

/// Model architecture the trainer fine-tunes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelArch {
    Alexnet,
    Resnet,
    Vgg,
    #[default]
    #[serde(rename = "not_configured", alias = "not configured")]
    NotConfigured,
}

impl ModelArch {
    pub fn is_configured(self) -> bool {
        self != Self::NotConfigured
    }
}

/// The active training configuration.
///
/// [`Default`] is the unconfigured placeholder the server boots with; it
/// does not pass validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TrainingConfig {
    pub model_arch: ModelArch,
    #[serde(alias = "numEpochs")]
    #[validate(custom(function = "validate_positive_number"))]
    pub max_epochs: String,
    #[validate(custom(function = "validate_positive_number"))]
    pub learning_rate: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_arch: ModelArch::NotConfigured,
            max_epochs: "0".to_string(),
            learning_rate: "0.0".to_string(),
        }
    }
}

impl TrainingConfig {
    /// Validate the numeric fields, mapping failures to [`CoreError::Validation`].
    ///
    /// The architecture is not checked here: storing an unconfigured
    /// architecture is allowed, launching with one is not.
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(format!("Invalid training config: {e}")))
    }
}

/// Parse `value` as a number and require it to be finite and above zero.
pub fn parse_positive_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n > 0.0)
}

fn validate_positive_number(value: &str) -> Result<(), ValidationError> {
    if parse_positive_number(value).is_some() {
        return Ok(());
    }
    let mut err = ValidationError::new("positive_number");
    err.message = Some(Cow::Borrowed("must be a positive number"));
    Err(err)
}
