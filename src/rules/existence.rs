use std::collections::BTreeSet;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::json;

use crate::database::{Entity, Repository};
use crate::filter::FilterData;
use crate::pipeline::{ExecutionContext, Rule, RuleError};

/// Record loaded by [`RecordExists`], left in the context for the execution step
#[derive(Debug, Clone)]
pub struct Loaded<E>(pub E);

/// Loads the target record; missing → NotFound
pub struct RecordExists<D, E> {
    id_of: fn(&D) -> i64,
    _entity: PhantomData<fn() -> E>,
}

impl<D, E> RecordExists<D, E> {
    pub fn new(id_of: fn(&D) -> i64) -> Self {
        Self {
            id_of,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<D: Send + Sync, E: Entity> Rule<D> for RecordExists<D, E> {
    fn name(&self) -> &str {
        "record_exists"
    }

    async fn check(&self, ctx: &mut ExecutionContext<D>) -> Result<(), RuleError> {
        let id = (self.id_of)(&ctx.dto);
        let record = Repository::<E>::new(ctx.store.clone())
            .find(id)
            .await?
            .ok_or_else(|| RuleError::NotFound(format!("{} {} not found", E::TABLE, id)))?;
        ctx.set_metadata(Loaded(record));
        Ok(())
    }
}

/// An optional foreign key must point at an existing row
pub struct ReferenceExists<D> {
    table: &'static str,
    field: &'static str,
    id_of: fn(&D) -> Option<i64>,
}

impl<D> ReferenceExists<D> {
    pub fn new(table: &'static str, field: &'static str, id_of: fn(&D) -> Option<i64>) -> Self {
        Self { table, field, id_of }
    }
}

#[async_trait]
impl<D: Send + Sync> Rule<D> for ReferenceExists<D> {
    fn name(&self) -> &str {
        "reference_exists"
    }

    async fn check(&self, ctx: &mut ExecutionContext<D>) -> Result<(), RuleError> {
        let Some(id) = (self.id_of)(&ctx.dto) else {
            return Ok(());
        };
        let count = ctx.store.count(self.table, FilterData::eq("id", id)).await?;
        if count == 0 {
            return Err(RuleError::NotFound(format!(
                "{} {} references a missing {} row",
                self.field, id, self.table
            )));
        }
        Ok(())
    }
}

/// Every id in a list must exist. `None` skips the check.
pub struct ReferencesExist<D> {
    table: &'static str,
    field: &'static str,
    ids_of: fn(&D) -> Option<Vec<i64>>,
}

impl<D> ReferencesExist<D> {
    pub fn new(table: &'static str, field: &'static str, ids_of: fn(&D) -> Option<Vec<i64>>) -> Self {
        Self { table, field, ids_of }
    }
}

#[async_trait]
impl<D: Send + Sync> Rule<D> for ReferencesExist<D> {
    fn name(&self) -> &str {
        "references_exist"
    }

    async fn check(&self, ctx: &mut ExecutionContext<D>) -> Result<(), RuleError> {
        let wanted: BTreeSet<i64> = match (self.ids_of)(&ctx.dto) {
            Some(ids) if !ids.is_empty() => ids.into_iter().collect(),
            _ => return Ok(()),
        };

        let filter = FilterData {
            select: Some(vec!["id".to_string()]),
            where_clause: Some(json!({ "id": { "$in": wanted.iter().collect::<Vec<_>>() } })),
            ..Default::default()
        };
        let found: BTreeSet<i64> = ctx
            .store
            .select(self.table, filter)
            .await?
            .iter()
            .filter_map(|row| row.get("id").and_then(|v| v.as_i64()))
            .collect();

        let missing: Vec<String> = wanted.difference(&found).map(|id| id.to_string()).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RuleError::NotFound(format!(
                "{} reference missing {} rows: {}",
                self.field,
                self.table,
                missing.join(", ")
            )))
        }
    }
}

/// Restrict-on-delete: no child row may still reference the id
pub struct NoDependents<D> {
    id_of: fn(&D) -> i64,
    children: &'static [(&'static str, &'static str)],
}

impl<D> NoDependents<D> {
    /// `children` lists `(table, column)` pairs that hold references
    pub fn new(id_of: fn(&D) -> i64, children: &'static [(&'static str, &'static str)]) -> Self {
        Self { id_of, children }
    }
}

#[async_trait]
impl<D: Send + Sync> Rule<D> for NoDependents<D> {
    fn name(&self) -> &str {
        "no_dependents"
    }

    async fn check(&self, ctx: &mut ExecutionContext<D>) -> Result<(), RuleError> {
        let id = (self.id_of)(&ctx.dto);
        let mut blocking = Vec::new();
        for (table, column) in self.children {
            let count = ctx.store.count(table, FilterData::eq(column, id)).await?;
            if count > 0 {
                blocking.push(format!("{} {}", count, table));
            }
        }
        if blocking.is_empty() {
            Ok(())
        } else {
            Err(RuleError::BadRequest(format!(
                "record {} is still referenced by {}",
                id,
                blocking.join(" and ")
            )))
        }
    }
}
