use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::filter::FilterData;
use crate::pipeline::{ExecutionContext, Rule, RuleError};

/// No other row may already hold the value in `column`
pub struct Unique<D> {
    table: &'static str,
    column: &'static str,
    value_of: fn(&D) -> Option<Value>,
    own_id: fn(&D) -> Option<i64>,
}

impl<D> Unique<D> {
    /// `value_of` returning None skips the check (field not being written).
    /// `own_id` excludes the record being updated.
    pub fn new(
        table: &'static str,
        column: &'static str,
        value_of: fn(&D) -> Option<Value>,
        own_id: fn(&D) -> Option<i64>,
    ) -> Self {
        Self {
            table,
            column,
            value_of,
            own_id,
        }
    }
}

#[async_trait]
impl<D: Send + Sync> Rule<D> for Unique<D> {
    fn name(&self) -> &str {
        "unique"
    }

    async fn check(&self, ctx: &mut ExecutionContext<D>) -> Result<(), RuleError> {
        let value = match (self.value_of)(&ctx.dto) {
            Some(Value::Null) | None => return Ok(()),
            Some(v) => v,
        };

        let mut conditions = Map::new();
        conditions.insert(self.column.to_string(), value.clone());
        if let Some(id) = (self.own_id)(&ctx.dto) {
            conditions.insert("id".to_string(), serde_json::json!({ "$ne": id }));
        }
        let filter = FilterData {
            where_clause: Some(Value::Object(conditions)),
            ..Default::default()
        };

        if ctx.store.count(self.table, filter).await? > 0 {
            let shown = match &value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(RuleError::Conflict(format!(
                "{} '{}' already exists in {}",
                self.column, shown, self.table
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, Store};
    use crate::types::{Actor, Role};
    use serde_json::json;
    use std::sync::Arc;

    struct Rename {
        id: Option<i64>,
        name: Option<String>,
    }

    fn rule() -> Unique<Rename> {
        Unique::new("categories", "name", |d| d.name.clone().map(Value::from), |d| d.id)
    }

    async fn check(store: &Arc<dyn Store>, id: Option<i64>, name: Option<&str>) -> Result<(), RuleError> {
        let dto = Rename { id, name: name.map(str::to_string) };
        let mut ctx = ExecutionContext::new("t", Actor::new("1", Role::Admin), store.clone(), dto);
        rule().check(&mut ctx).await
    }

    #[tokio::test]
    async fn conflicts_only_with_other_rows() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        store
            .insert("categories", json!({"name": "rust"}).as_object().cloned().unwrap())
            .await
            .unwrap();

        assert!(matches!(check(&store, None, Some("rust")).await, Err(RuleError::Conflict(_))));
        assert!(check(&store, None, Some("go")).await.is_ok());
        // renaming a row to its own name is fine
        assert!(check(&store, Some(1), Some("rust")).await.is_ok());
        assert!(matches!(check(&store, Some(2), Some("rust")).await, Err(RuleError::Conflict(_))));
        assert!(check(&store, Some(2), None).await.is_ok());
    }
}
