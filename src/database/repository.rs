use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::database::manager::DatabaseError;
use crate::database::store::{Row, Store};
use crate::filter::FilterData;

/// A record type stored in one table
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;

    /// Column names callers may filter and sort on
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> i64;
}

/// Typed access to a table through a [`Store`]
pub struct Repository<E> {
    store: Arc<dyn Store>,
    _phantom: PhantomData<E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn list(&self, filter: FilterData) -> Result<Vec<E>, DatabaseError> {
        let rows = self.store.select(E::TABLE, filter).await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn find_by(&self, filter: FilterData) -> Result<Option<E>, DatabaseError> {
        let rows = self.store.select(E::TABLE, filter.with_limit(1)).await?;
        rows.into_iter().next().map(decode).transpose()
    }

    pub async fn find(&self, id: i64) -> Result<Option<E>, DatabaseError> {
        self.find_by(FilterData::eq("id", id)).await
    }

    pub async fn count(&self, filter: FilterData) -> Result<i64, DatabaseError> {
        self.store.count(E::TABLE, filter).await
    }

    pub async fn insert(&self, row: Row) -> Result<E, DatabaseError> {
        decode(self.store.insert(E::TABLE, row).await?)
    }

    pub async fn update(&self, id: i64, changes: Row) -> Result<Option<E>, DatabaseError> {
        self.store.update(E::TABLE, id, changes).await?.map(decode).transpose()
    }

    /// Returns whether a row was removed
    pub async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        Ok(self.store.delete(E::TABLE, FilterData::eq("id", id)).await? > 0)
    }
}

pub fn decode<E: DeserializeOwned>(row: Row) -> Result<E, DatabaseError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// Serialize a value into a row. Non-object values are rejected.
pub fn to_row<T: Serialize>(value: &T) -> Result<Row, DatabaseError> {
    match serde_json::to_value(value).map_err(|e| DatabaseError::Serialization(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::Serialization(format!("expected object, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use serde_json::json;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Tag {
        id: i64,
        label: String,
    }

    impl Entity for Tag {
        const TABLE: &'static str = "tags";
        const COLUMNS: &'static [&'static str] = &["id", "label"];
        fn id(&self) -> i64 {
            self.id
        }
    }

    #[tokio::test]
    async fn typed_round_trip_through_store() {
        let repo: Repository<Tag> = Repository::new(Arc::new(MemoryStore::new()));
        let mut row = Row::new();
        row.insert("label".into(), json!("alpha"));
        let tag = repo.insert(row).await.unwrap();
        assert_eq!(tag, Tag { id: 1, label: "alpha".into() });

        assert_eq!(repo.find(1).await.unwrap(), Some(Tag { id: 1, label: "alpha".into() }));
        assert!(repo.find(2).await.unwrap().is_none());

        assert!(repo.delete(1).await.unwrap());
        assert!(!repo.delete(1).await.unwrap());
    }

    #[test]
    fn to_row_requires_object() {
        assert!(to_row(&json!([1, 2])).is_err());
        assert_eq!(to_row(&json!({"a": 1})).unwrap()["a"], json!(1));
    }
}
