use std::time::Duration;

use async_trait::async_trait;

use crate::config;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::error::RuleError;

/// A named guard that runs before the execution step
#[async_trait]
pub trait Rule<D>: Send + Sync {
    /// Rule name for logging and debugging
    fn name(&self) -> &str;

    /// Execution timeout (configured default, 5 seconds out of the box)
    fn timeout(&self) -> Duration {
        Duration::from_millis(config::config().api.rule_timeout_ms)
    }

    async fn check(&self, ctx: &mut ExecutionContext<D>) -> Result<(), RuleError>;
}

type CheckFn<D> = Box<dyn Fn(&ExecutionContext<D>) -> Result<(), RuleError> + Send + Sync>;

/// Synchronous closure as a rule
pub struct FnRule<D> {
    name: String,
    check: CheckFn<D>,
}

impl<D> FnRule<D> {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ExecutionContext<D>) -> Result<(), RuleError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Box::new(check),
        }
    }
}

#[async_trait]
impl<D: Send + Sync> Rule<D> for FnRule<D> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &mut ExecutionContext<D>) -> Result<(), RuleError> {
        (self.check)(ctx)
    }
}
