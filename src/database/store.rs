use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::database::manager::DatabaseError;
use crate::filter::FilterData;

/// A table row as a JSON object keyed by column name
pub type Row = Map<String, Value>;

/// One group of an aggregate query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub key: Option<String>,
    pub count: i64,
    pub total: f64,
}

/// Row storage used by every pipeline execution.
///
/// Tables are addressed by name and rows are JSON objects. Every table has an
/// integer `id` primary key assigned on insert.
#[async_trait]
pub trait Store: Send + Sync {
    async fn select(&self, table: &str, filter: FilterData) -> Result<Vec<Row>, DatabaseError>;

    async fn count(&self, table: &str, filter: FilterData) -> Result<i64, DatabaseError>;

    /// Inserts and returns the stored row, `id` included. A caller-provided `id` is ignored.
    async fn insert(&self, table: &str, row: Row) -> Result<Row, DatabaseError>;

    /// Applies `changes` to the row with `id`. Returns None if there is no such row.
    async fn update(&self, table: &str, id: i64, changes: Row) -> Result<Option<Row>, DatabaseError>;

    /// Deletes every row matching the filter's where clause and returns how many went
    async fn delete(&self, table: &str, filter: FilterData) -> Result<u64, DatabaseError>;

    /// `GROUP BY group_by` with `COUNT(*)` and `SUM(sum_column)`, ordered by key (NULL last)
    async fn aggregate(
        &self,
        table: &str,
        filter: FilterData,
        group_by: &str,
        sum_column: &str,
    ) -> Result<Vec<Bucket>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}
