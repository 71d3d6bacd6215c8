//! Parameter sets and parameter validation shared by all strategies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Immutable mapping of parameter name to numeric value.
///
/// Boolean switches are encoded as 0.0 (off) / non-zero (on); integer
/// parameters must carry whole values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, f64>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for ParamSet {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(defaults)");
        }
        let mut first = true;
        for (name, value) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParamError {
    #[error("unknown parameter '{name}' for strategy {strategy}")]
    UnknownParam { strategy: String, name: String },

    #[error("invalid value {value} for parameter '{name}': {reason}")]
    InvalidValue {
        name: String,
        value: f64,
        reason: &'static str,
    },
}

impl ParamError {
    fn invalid(name: &str, value: f64, reason: &'static str) -> Self {
        ParamError::InvalidValue {
            name: name.to_string(),
            value,
            reason,
        }
    }
}

// ─── Value coercion ──────────────────────────────────────────────────

pub(crate) fn flag(value: f64) -> bool {
    value != 0.0
}

pub(crate) fn positive(name: &str, value: f64) -> Result<f64, ParamError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ParamError::invalid(name, value, "must be a positive number"))
    }
}

/// A fraction in (0, 1].
pub(crate) fn fraction(name: &str, value: f64) -> Result<f64, ParamError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(ParamError::invalid(name, value, "must be in (0, 1]"))
    }
}

pub(crate) fn whole(name: &str, value: f64) -> Result<usize, ParamError> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(ParamError::invalid(name, value, "must be a non-negative integer"))
    }
}

pub(crate) fn bounded(name: &str, value: f64, lo: f64, hi: f64) -> Result<f64, ParamError> {
    if value.is_finite() && value >= lo && value <= hi {
        Ok(value)
    } else {
        Err(ParamError::invalid(name, value, "out of range"))
    }
}
