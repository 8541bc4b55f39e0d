//! Property validators
//!
//! Validators are registered per (type, key) and accumulated across the whole
//! ancestry of a type, so a subtype is checked against every rule its
//! superclasses and interfaces declare.

use super::PropertyKey;
use crate::core::{CoreError, Result};
use regex::Regex;
use serde_json::Value;

/// A single validation rule applied to one property value.
pub trait PropertyValidator: Send + Sync {
    /// Rule name for diagnostics
    fn name(&self) -> &'static str;

    fn validate(&self, type_name: &str, key: &PropertyKey, value: &Value) -> Result<()>;
}

fn failure(type_name: &str, key: &PropertyKey, message: String) -> CoreError {
    CoreError::ValidationFailed(type_name.to_string(), key.json_name().to_string(), message)
}

/// Rejects null and missing values.
#[derive(Debug, Clone, Default)]
pub struct NotNullValidator;

impl PropertyValidator for NotNullValidator {
    fn name(&self) -> &'static str {
        "not_null"
    }

    fn validate(&self, type_name: &str, key: &PropertyKey, value: &Value) -> Result<()> {
        if value.is_null() {
            return Err(failure(type_name, key, "must not be null".to_string()));
        }
        Ok(())
    }
}

/// Requires string values to match a regular expression. Nulls pass.
#[derive(Debug, Clone)]
pub struct PatternValidator {
    pattern: Regex,
}

impl PatternValidator {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|err| CoreError::ConfigError(format!("invalid pattern '{}': {}", pattern, err)))?;
        Ok(Self { pattern })
    }
}

impl PropertyValidator for PatternValidator {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn validate(&self, type_name: &str, key: &PropertyKey, value: &Value) -> Result<()> {
        match value {
            Value::Null => Ok(()),
            Value::String(text) if self.pattern.is_match(text) => Ok(()),
            Value::String(text) => Err(failure(
                type_name,
                key,
                format!("'{}' does not match {}", text, self.pattern.as_str()),
            )),
            other => Err(failure(type_name, key, format!("expected a string, got {}", other))),
        }
    }
}

/// Bounds the character length of string values. Nulls pass.
#[derive(Debug, Clone)]
pub struct LengthValidator {
    min: usize,
    max: usize,
}

impl LengthValidator {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

impl PropertyValidator for LengthValidator {
    fn name(&self) -> &'static str {
        "length"
    }

    fn validate(&self, type_name: &str, key: &PropertyKey, value: &Value) -> Result<()> {
        let Value::String(text) = value else {
            return Ok(());
        };

        let len = text.chars().count();
        if len < self.min || len > self.max {
            return Err(failure(
                type_name,
                key,
                format!("length {} outside [{}, {}]", len, self.min, self.max),
            ));
        }
        Ok(())
    }
}
