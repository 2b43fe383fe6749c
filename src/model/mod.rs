//! Login risk model
//!
//! A pre-trained binary classifier scores a login from its coordinates.
//! The score is compared against a threshold to allow or deny the login.

pub mod layers;

pub use layers::LayersModel;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while loading or running a model
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid model.json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid model topology: {0}")]
    Topology(String),

    #[error("Unsupported layer type: {0}")]
    UnsupportedLayer(String),

    #[error("Unsupported activation: {0}")]
    UnsupportedActivation(String),

    #[error("Invalid weights: {0}")]
    Weights(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Model produced no output")]
    EmptyOutput,

    #[error("Model unavailable: {0}")]
    Unavailable(String),
}

/// A binary classifier producing one score per input row
pub trait RiskModel: Send + Sync {
    /// Score a single feature row
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError>;
}

/// Stand-in used when the model failed to load at startup
///
/// Every prediction fails with the original load error.
pub struct UnavailableModel {
    reason: String,
}

impl UnavailableModel {
    pub fn new(reason: impl Into<String>) -> Self {
        UnavailableModel {
            reason: reason.into(),
        }
    }
}

impl RiskModel for UnavailableModel {
    fn predict(&self, _features: &[f64]) -> Result<f64, ModelError> {
        Err(ModelError::Unavailable(self.reason.clone()))
    }
}

/// Outcome of a scalar threshold decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "Login Allowed")]
    LoginAllowed,
    #[serde(rename = "Login Denied")]
    LoginDenied,
}

impl Decision {
    /// Allowed iff `score` is strictly above `threshold`; NaN is denied
    pub fn from_score(score: f64, threshold: f64) -> Self {
        if score > threshold {
            Decision::LoginAllowed
        } else {
            Decision::LoginDenied
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::LoginAllowed => "Login Allowed",
            Decision::LoginDenied => "Login Denied",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
