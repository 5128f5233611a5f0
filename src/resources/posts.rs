use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::database::{to_row, DatabaseError, Entity, Row, Store};
use crate::filter::FilterData;
use crate::pipeline::FieldError;
use crate::resources::crud::{Crud, ResourceEntity, Update, WriteInput};
use crate::rules::{nullable, FieldErrors, ReferenceExists, ReferencesExist, Validate};
use crate::types::Resource;

pub const LINK_TABLE: &str = "post_categories";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub published: bool,
    pub author_id: i64,
    /// Linked categories, sorted; not a column of `posts`
    #[serde(default)]
    pub category_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Post {
    const TABLE: &'static str = "posts";
    const COLUMNS: &'static [&'static str] =
        &["id", "title", "content", "published", "author_id", "created_at", "updated_at"];

    fn id(&self) -> i64 {
        self.id
    }
}

#[async_trait]
impl ResourceEntity for Post {
    const RESOURCE: Resource = Resource::Posts;
    const SEARCHABLE: &'static [&'static str] = &["title", "content"];
    const DEFAULT_ORDER: &'static str = "created_at desc, id desc";
    const CASCADE: &'static [(&'static str, &'static str)] = &[(LINK_TABLE, "post_id")];

    async fn hydrate(store: &Arc<dyn Store>, records: &mut [Self]) -> Result<(), DatabaseError> {
        if records.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = records.iter().map(|p| p.id).collect();
        let filter = FilterData {
            where_clause: Some(json!({ "post_id": { "$in": ids } })),
            ..Default::default()
        };

        let mut links: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        for row in store.select(LINK_TABLE, filter).await? {
            if let (Some(post_id), Some(category_id)) = (
                row.get("post_id").and_then(Value::as_i64),
                row.get("category_id").and_then(Value::as_i64),
            ) {
                links.entry(post_id).or_default().insert(category_id);
            }
        }
        for post in records.iter_mut() {
            post.category_ids = links.remove(&post.id).map(|set| set.into_iter().collect()).unwrap_or_default();
        }
        Ok(())
    }
}

/// Replace the category links of a post
pub async fn replace_links(store: &Arc<dyn Store>, post_id: i64, category_ids: &[i64]) -> Result<(), DatabaseError> {
    store.delete(LINK_TABLE, FilterData::eq("post_id", post_id)).await?;
    let distinct: BTreeSet<i64> = category_ids.iter().copied().collect();
    for category_id in distinct {
        let mut link = Row::new();
        link.insert("post_id".to_string(), Value::from(post_id));
        link.insert("category_id".to_string(), Value::from(category_id));
        store.insert(LINK_TABLE, link).await?;
    }
    Ok(())
}

fn check_category_ids(errors: &mut FieldErrors, ids: &[i64]) {
    let distinct: BTreeSet<&i64> = ids.iter().collect();
    if distinct.len() != ids.len() {
        errors.add("category_ids", "must not contain duplicates");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePost {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub published: bool,
    pub author_id: i64,
    #[serde(default)]
    pub category_ids: Vec<i64>,
}

impl Validate for CreatePost {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::new();
        errors.length("title", &self.title, 1, 200);
        if let Some(content) = &self.content {
            errors.max_length("content", content, 10_000);
        }
        check_category_ids(&mut errors, &self.category_ids);
        errors.into_vec()
    }
}

#[async_trait]
impl WriteInput<Post> for CreatePost {
    fn columns(&self, _existing: Option<&Post>) -> Result<Row, DatabaseError> {
        let mut row = to_row(self)?;
        row.remove("category_ids");
        Ok(row)
    }

    async fn after_write(&self, store: &Arc<dyn Store>, id: i64) -> Result<(), DatabaseError> {
        replace_links(store, id, &self.category_ids).await
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePost {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub content: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i64>,
    /// Replaces the link set when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_ids: Option<Vec<i64>>,
}

impl Validate for UpdatePost {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            errors.length("title", title, 1, 200);
        }
        if let Some(Some(content)) = &self.content {
            errors.max_length("content", content, 10_000);
        }
        if let Some(ids) = &self.category_ids {
            check_category_ids(&mut errors, ids);
        }
        errors.into_vec()
    }
}

#[async_trait]
impl WriteInput<Post> for UpdatePost {
    fn columns(&self, _existing: Option<&Post>) -> Result<Row, DatabaseError> {
        let mut row = to_row(self)?;
        row.remove("category_ids");
        Ok(row)
    }

    async fn after_write(&self, store: &Arc<dyn Store>, id: i64) -> Result<(), DatabaseError> {
        match &self.category_ids {
            Some(ids) => replace_links(store, id, ids).await,
            None => Ok(()),
        }
    }
}

pub type PostsService = Crud<Post, CreatePost, UpdatePost>;

pub fn service(store: Arc<dyn Store>) -> PostsService {
    Crud::builder(store)
        .create_rule(ReferenceExists::new("users", "author_id", |dto: &CreatePost| Some(dto.author_id)))
        .create_rule(ReferencesExist::new("categories", "category_ids", |dto: &CreatePost| {
            Some(dto.category_ids.clone())
        }))
        .update_rule(ReferenceExists::new("users", "author_id", |dto: &Update<UpdatePost>| {
            dto.changes.author_id
        }))
        .update_rule(ReferencesExist::new("categories", "category_ids", |dto: &Update<UpdatePost>| {
            dto.changes.category_ids.clone()
        }))
        .build()
}
