use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::database::{to_row, DatabaseError, Entity, Repository, Row, Store};
use crate::filter::FilterData;
use crate::pipeline::{ExecutionContext, FieldError, Pipeline, Rule, RuleError};
use crate::rules::{
    Authorize, ListRequest, Loaded, NoDependents, Page, RecordExists, Validate, ValidateInput, ValidateListQuery,
};
use crate::types::{Action, Actor, Resource};

/// An entity served as a REST resource
#[async_trait]
pub trait ResourceEntity: Entity + Clone {
    const RESOURCE: Resource;

    /// Columns matched (ILIKE) by the `search` parameter
    const SEARCHABLE: &'static [&'static str];

    const DEFAULT_ORDER: &'static str = "id asc";

    /// `(table, column)` rows deleted together with the record
    const CASCADE: &'static [(&'static str, &'static str)] = &[];

    /// `(table, column)` rows that block deleting the record
    const RESTRICT: &'static [(&'static str, &'static str)] = &[];

    /// Fill in fields that do not live in the entity's own row
    async fn hydrate(_store: &Arc<dyn Store>, _records: &mut [Self]) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Create/update input for `E`
#[async_trait]
pub trait WriteInput<E>: Validate + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Column values to write. `existing` is the stored record on update.
    fn columns(&self, _existing: Option<&E>) -> Result<Row, DatabaseError> {
        to_row(self)
    }

    /// Writes outside the entity's own row, run after insert/update
    async fn after_write(&self, _store: &Arc<dyn Store>, _id: i64) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Input of get/delete pipelines
#[derive(Debug, Clone, Copy)]
pub struct ById {
    pub id: i64,
}

/// Input of update pipelines
#[derive(Debug, Clone)]
pub struct Update<U> {
    pub id: i64,
    pub changes: U,
}

impl<U: Validate> Validate for Update<U> {
    fn validate(&self) -> Vec<FieldError> {
        self.changes.validate()
    }
}

/// The five operations every resource exposes over HTTP
#[async_trait]
pub trait CrudService: Send + Sync + 'static {
    type Record: Serialize + Send + Sync + 'static;
    type Create: DeserializeOwned + Send + 'static;
    type Update: DeserializeOwned + Send + 'static;

    async fn list(&self, actor: Actor, request: ListRequest) -> Result<Page<Self::Record>, RuleError>;
    async fn get(&self, actor: Actor, id: i64) -> Result<Self::Record, RuleError>;
    async fn create(&self, actor: Actor, input: Self::Create) -> Result<Self::Record, RuleError>;
    async fn update(&self, actor: Actor, id: i64, input: Self::Update) -> Result<Self::Record, RuleError>;
    async fn delete(&self, actor: Actor, id: i64) -> Result<Self::Record, RuleError>;
}

/// Standard pipelines for one resource
pub struct Crud<E, C, U> {
    list: Pipeline<ListRequest, Page<E>>,
    get: Pipeline<ById, E>,
    create: Pipeline<C, E>,
    update: Pipeline<Update<U>, E>,
    delete: Pipeline<ById, E>,
}

pub struct CrudBuilder<E, C, U> {
    store: Arc<dyn Store>,
    create_rules: Vec<Box<dyn Rule<C>>>,
    update_rules: Vec<Box<dyn Rule<Update<U>>>>,
    _entity: PhantomData<fn() -> E>,
}

/// RFC 3339 UTC timestamp for created_at/updated_at
pub fn timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn take_loaded<E: Entity, D>(ctx: &mut ExecutionContext<D>) -> Result<E, RuleError> {
    ctx.take_metadata::<Loaded<E>>()
        .map(|loaded| loaded.0)
        .ok_or_else(|| RuleError::Database(format!("{} record was not loaded", E::TABLE)))
}

async fn hydrated<E: ResourceEntity>(store: &Arc<dyn Store>, record: E) -> Result<E, RuleError> {
    let mut one = vec![record];
    E::hydrate(store, &mut one).await?;
    one.pop()
        .ok_or_else(|| RuleError::Database(format!("{} record lost while loading", E::TABLE)))
}

impl<E, C, U> Crud<E, C, U>
where
    E: ResourceEntity,
    C: WriteInput<E>,
    U: WriteInput<E>,
{
    pub fn builder(store: Arc<dyn Store>) -> CrudBuilder<E, C, U> {
        CrudBuilder {
            store,
            create_rules: Vec::new(),
            update_rules: Vec::new(),
            _entity: PhantomData,
        }
    }

    pub fn list_pipeline(&self) -> &Pipeline<ListRequest, Page<E>> {
        &self.list
    }

    pub fn create_pipeline(&self) -> &Pipeline<C, E> {
        &self.create
    }

    pub fn update_pipeline(&self) -> &Pipeline<Update<U>, E> {
        &self.update
    }

    pub fn delete_pipeline(&self) -> &Pipeline<ById, E> {
        &self.delete
    }
}

impl<E, C, U> CrudBuilder<E, C, U>
where
    E: ResourceEntity,
    C: WriteInput<E>,
    U: WriteInput<E>,
{
    /// Extra create rule, run after authorization and input validation
    pub fn create_rule(mut self, rule: impl Rule<C> + 'static) -> Self {
        self.create_rules.push(Box::new(rule));
        self
    }

    /// Extra update rule, run after the record has been loaded
    pub fn update_rule(mut self, rule: impl Rule<Update<U>> + 'static) -> Self {
        self.update_rules.push(Box::new(rule));
        self
    }

    pub fn build(self) -> Crud<E, C, U> {
        let resource = E::RESOURCE;
        let store = self.store;

        let list = Pipeline::builder(format!("{}.list", resource), store.clone())
            .rule(Authorize::new(resource, Action::Read))
            .rule(ValidateListQuery::<E>::new())
            .execution(|ctx: ExecutionContext<ListRequest>| async move {
                let repo = Repository::<E>::new(ctx.store.clone());
                let filter = ctx.dto.to_filter(E::SEARCHABLE, E::DEFAULT_ORDER);
                let total = repo
                    .count(FilterData {
                        where_clause: filter.where_clause.clone(),
                        ..Default::default()
                    })
                    .await?;
                let mut items = repo.list(filter).await?;
                E::hydrate(&ctx.store, &mut items).await?;
                Ok::<_, RuleError>(Page {
                    items,
                    total,
                    page: ctx.dto.page(),
                    page_size: ctx.dto.page_size(),
                })
            });

        let get = Pipeline::builder(format!("{}.get", resource), store.clone())
            .rule(Authorize::new(resource, Action::Read))
            .rule(RecordExists::<ById, E>::new(|dto| dto.id))
            .execution(|mut ctx: ExecutionContext<ById>| async move {
                let record = take_loaded::<E, _>(&mut ctx)?;
                hydrated(&ctx.store, record).await
            });

        let create = Pipeline::builder(format!("{}.create", resource), store.clone())
            .rule(Authorize::new(resource, Action::Create))
            .rule(ValidateInput)
            .rules(self.create_rules)
            .execution(|ctx: ExecutionContext<C>| async move {
                let mut row = WriteInput::<E>::columns(&ctx.dto, None)?;
                let now = timestamp();
                row.insert("created_at".to_string(), now.clone());
                row.insert("updated_at".to_string(), now);

                let record = Repository::<E>::new(ctx.store.clone()).insert(row).await?;
                WriteInput::<E>::after_write(&ctx.dto, &ctx.store, record.id()).await?;
                tracing::info!("Created {} {}", E::TABLE, record.id());
                hydrated(&ctx.store, record).await
            });

        let update = Pipeline::builder(format!("{}.update", resource), store.clone())
            .rule(Authorize::new(resource, Action::Update))
            .rule(ValidateInput)
            .rule(RecordExists::<Update<U>, E>::new(|dto| dto.id))
            .rules(self.update_rules)
            .execution(|mut ctx: ExecutionContext<Update<U>>| async move {
                let existing = take_loaded::<E, _>(&mut ctx)?;
                let mut changes = WriteInput::<E>::columns(&ctx.dto.changes, Some(&existing))?;
                changes.insert("updated_at".to_string(), timestamp());

                let record = Repository::<E>::new(ctx.store.clone())
                    .update(existing.id(), changes)
                    .await?
                    .ok_or_else(|| RuleError::NotFound(format!("{} {} not found", E::TABLE, existing.id())))?;
                WriteInput::<E>::after_write(&ctx.dto.changes, &ctx.store, record.id()).await?;
                tracing::info!("Updated {} {}", E::TABLE, record.id());
                hydrated(&ctx.store, record).await
            });

        let mut delete = Pipeline::builder(format!("{}.delete", resource), store.clone())
            .rule(Authorize::new(resource, Action::Delete))
            .rule(RecordExists::<ById, E>::new(|dto| dto.id));
        if !E::RESTRICT.is_empty() {
            delete = delete.rule(NoDependents::<ById>::new(|dto| dto.id, E::RESTRICT));
        }
        let delete = delete.execution(|mut ctx: ExecutionContext<ById>| async move {
            let record = take_loaded::<E, _>(&mut ctx)?;
            let record = hydrated(&ctx.store, record).await?;
            for (table, column) in E::CASCADE {
                ctx.store.delete(table, FilterData::eq(column, record.id())).await?;
            }
            Repository::<E>::new(ctx.store.clone()).delete(record.id()).await?;
            tracing::info!("Deleted {} {}", E::TABLE, record.id());
            Ok::<_, RuleError>(record)
        });

        Crud {
            list,
            get,
            create,
            update,
            delete,
        }
    }
}

#[async_trait]
impl<E, C, U> CrudService for Crud<E, C, U>
where
    E: ResourceEntity,
    C: WriteInput<E>,
    U: WriteInput<E>,
{
    type Record = E;
    type Create = C;
    type Update = U;

    async fn list(&self, actor: Actor, request: ListRequest) -> Result<Page<E>, RuleError> {
        self.list.execute(actor, request).await
    }

    async fn get(&self, actor: Actor, id: i64) -> Result<E, RuleError> {
        self.get.execute(actor, ById { id }).await
    }

    async fn create(&self, actor: Actor, input: C) -> Result<E, RuleError> {
        self.create.execute(actor, input).await
    }

    async fn update(&self, actor: Actor, id: i64, input: U) -> Result<E, RuleError> {
        self.update.execute(actor, Update { id, changes: input }).await
    }

    async fn delete(&self, actor: Actor, id: i64) -> Result<E, RuleError> {
        self.delete.execute(actor, ById { id }).await
    }
}
