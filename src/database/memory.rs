use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::database::manager::DatabaseError;
use crate::database::store::{Bucket, Row, Store};
use crate::filter::{is_valid_identifier, matcher, FilterData};

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Row>,
}

/// In-process store used for tests and `DATABASE_BACKEND=memory`.
///
/// Tables spring into existence on first use. Constraints (unique columns,
/// foreign keys) are enforced by the rule chains, not here.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_table(table: &str) -> Result<(), DatabaseError> {
    if is_valid_identifier(table) {
        Ok(())
    } else {
        Err(DatabaseError::InvalidIdentifier(table.to_string()))
    }
}

fn where_only(filter: &FilterData) -> FilterData {
    FilterData {
        where_clause: filter.where_clause.clone(),
        ..Default::default()
    }
}

fn key_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, table: &str, filter: FilterData) -> Result<Vec<Row>, DatabaseError> {
        check_table(table)?;
        let tables = self.tables.read().await;
        let rows = match tables.get(table) {
            Some(t) => t.rows.values().cloned().collect(),
            None => Vec::new(),
        };
        Ok(matcher::apply(rows, &filter)?)
    }

    async fn count(&self, table: &str, filter: FilterData) -> Result<i64, DatabaseError> {
        let rows = self.select(table, where_only(&filter)).await?;
        Ok(rows.len() as i64)
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, DatabaseError> {
        check_table(table)?;
        for column in row.keys() {
            if !is_valid_identifier(column) {
                return Err(DatabaseError::InvalidIdentifier(column.clone()));
            }
        }
        let mut tables = self.tables.write().await;
        let t = tables.entry(table.to_string()).or_default();
        t.next_id += 1;
        let id = t.next_id;
        row.insert("id".to_string(), Value::from(id));
        t.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: i64, changes: Row) -> Result<Option<Row>, DatabaseError> {
        check_table(table)?;
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.get_mut(table).and_then(|t| t.rows.get_mut(&id)) else {
            return Ok(None);
        };
        for (column, value) in changes {
            if column == "id" {
                continue;
            }
            if !is_valid_identifier(&column) {
                return Err(DatabaseError::InvalidIdentifier(column));
            }
            existing.insert(column, value);
        }
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, table: &str, filter: FilterData) -> Result<u64, DatabaseError> {
        check_table(table)?;
        let mut tables = self.tables.write().await;
        let Some(t) = tables.get_mut(table) else {
            return Ok(0);
        };
        let mut doomed = Vec::new();
        for (id, row) in &t.rows {
            if matcher::matches_row(filter.where_clause.as_ref(), row)? {
                doomed.push(*id);
            }
        }
        for id in &doomed {
            t.rows.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn aggregate(
        &self,
        table: &str,
        filter: FilterData,
        group_by: &str,
        sum_column: &str,
    ) -> Result<Vec<Bucket>, DatabaseError> {
        for name in [group_by, sum_column] {
            if !is_valid_identifier(name) {
                return Err(DatabaseError::InvalidIdentifier(name.to_string()));
            }
        }
        let rows = self.select(table, where_only(&filter)).await?;

        let mut groups: BTreeMap<Option<String>, (i64, f64)> = BTreeMap::new();
        for row in &rows {
            let key = key_text(row.get(group_by).unwrap_or(&Value::Null));
            let amount = row.get(sum_column).and_then(Value::as_f64).unwrap_or(0.0);
            let entry = groups.entry(key).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += amount;
        }

        // BTreeMap puts None first; NULL groups belong last
        let (nulls, keyed): (Vec<_>, Vec<_>) = groups.into_iter().partition(|(k, _)| k.is_none());
        Ok(keyed
            .into_iter()
            .chain(nulls)
            .map(|(key, (count, total))| Bucket { key, count, total })
            .collect())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
