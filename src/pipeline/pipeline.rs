use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tokio::time::timeout;

use crate::database::Store;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::error::RuleError;
use crate::pipeline::traits::Rule;
use crate::types::Actor;

type Execution<D, R> = Box<dyn Fn(ExecutionContext<D>) -> BoxFuture<'static, Result<R, RuleError>> + Send + Sync>;

/// Ordered rules followed by one execution step.
///
/// Rules run in the order they were added. The first failure (or timeout)
/// becomes the result and nothing after it runs.
pub struct Pipeline<D, R> {
    name: String,
    store: Arc<dyn Store>,
    rules: Vec<Box<dyn Rule<D>>>,
    execution: Execution<D, R>,
}

pub struct PipelineBuilder<D> {
    name: String,
    store: Arc<dyn Store>,
    rules: Vec<Box<dyn Rule<D>>>,
}

impl<D: Send + Sync + 'static> PipelineBuilder<D> {
    pub fn rule(mut self, rule: impl Rule<D> + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = Box<dyn Rule<D>>>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn execution<R, F, Fut>(self, f: F) -> Pipeline<D, R>
    where
        F: Fn(ExecutionContext<D>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, RuleError>> + Send + 'static,
    {
        Pipeline {
            name: self.name,
            store: self.store,
            rules: self.rules,
            execution: Box::new(move |ctx| Box::pin(f(ctx))),
        }
    }
}

impl<D: Send + Sync + 'static> Pipeline<D, ()> {
    /// Start a pipeline; the output type is fixed by `execution`
    pub fn builder(name: impl Into<String>, store: Arc<dyn Store>) -> PipelineBuilder<D> {
        PipelineBuilder {
            name: name.into(),
            store,
            rules: Vec::new(),
        }
    }
}

impl<D: Send + Sync + 'static, R> Pipeline<D, R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub async fn execute(&self, actor: Actor, dto: D) -> Result<R, RuleError> {
        let mut ctx = ExecutionContext::new(self.name.clone(), actor, self.store.clone(), dto);

        tracing::debug!(
            "Pipeline {} starting for {} ({}), rules={:?}",
            self.name, ctx.actor.id, ctx.actor.role, self.rule_names()
        );

        for rule in &self.rules {
            let rule_start = Instant::now();
            let limit = rule.timeout();

            match timeout(limit, rule.check(&mut ctx)).await {
                Ok(Ok(())) => {
                    tracing::debug!("Rule: {} passed in {:?}", rule.name(), rule_start.elapsed());
                }
                Ok(Err(error)) => {
                    tracing::warn!(
                        "Rule: {} rejected {} in {:?}: {}",
                        rule.name(), self.name, rule_start.elapsed(), error
                    );
                    return Err(error);
                }
                Err(_elapsed) => {
                    tracing::warn!("Rule: {} timed out after {:?}", rule.name(), limit);
                    return Err(RuleError::Timeout(format!(
                        "rule {} timed out after {:?}",
                        rule.name(),
                        limit
                    )));
                }
            }
        }

        let started = ctx.start_time;
        let result = (self.execution)(ctx).await;
        match &result {
            Ok(_) => tracing::debug!("Pipeline {} completed in {:?}", self.name, started.elapsed()),
            Err(e) => tracing::warn!("Pipeline {} execution failed: {}", self.name, e),
        }
        result
    }
}
