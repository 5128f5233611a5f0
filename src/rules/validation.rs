use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::pipeline::{ExecutionContext, FieldError, Rule, RuleError};

/// Input shapes that can check themselves
pub trait Validate {
    fn validate(&self) -> Vec<FieldError>;
}

/// Runs `Validate` on the pipeline input
pub struct ValidateInput;

#[async_trait]
impl<D: Validate + Send + Sync> Rule<D> for ValidateInput {
    fn name(&self) -> &str {
        "validate_input"
    }

    async fn check(&self, ctx: &mut ExecutionContext<D>) -> Result<(), RuleError> {
        let errors = ctx.dto.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RuleError::Invalid(errors))
        }
    }
}

/// Accumulates field errors while a DTO checks its fields
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.0.push(FieldError::new(field, message));
        self
    }

    /// Character count within `min..=max`
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.chars().count();
        if len < min || len > max {
            if min > 0 && value.trim().is_empty() {
                self.add(field, "must not be empty");
            } else {
                self.add(field, format!("length must be between {} and {}", min, max));
            }
        }
        self
    }

    pub fn max_length(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.chars().count() > max {
            self.add(field, format!("must be at most {} characters", max));
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !is_email(value) {
            self.add(field, "must be a valid email address");
        }
        self
    }

    pub fn http_url(&mut self, field: &str, value: &str) -> &mut Self {
        if !is_http_url(value) {
            self.add(field, "must be an http(s) URL");
        }
        self
    }

    pub fn range(&mut self, field: &str, value: i64, min: i64, max: i64) -> &mut Self {
        if value < min || value > max {
            self.add(field, format!("must be between {} and {}", min, max));
        }
        self
    }

    pub fn non_negative(&mut self, field: &str, value: f64) -> &mut Self {
        if !value.is_finite() || value < 0.0 {
            self.add(field, "must be a finite number >= 0");
        }
        self
    }

    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) -> &mut Self {
        if !allowed.contains(&value) {
            self.add(field, format!("must be one of: {}", allowed.join(", ")));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }
}

pub fn is_email(value: &str) -> bool {
    if value.len() > 254 || value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

pub fn is_http_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
/// Use with `#[serde(default, deserialize_with = "nullable")]`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
