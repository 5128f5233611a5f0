use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::{Entity, Store};
use crate::pipeline::FieldError;
use crate::resources::crud::{Crud, ResourceEntity, Update, WriteInput};
use crate::resources::posts::LINK_TABLE;
use crate::rules::{nullable, FieldErrors, Unique, Validate};
use crate::types::Resource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Category {
    const TABLE: &'static str = "categories";
    const COLUMNS: &'static [&'static str] = &["id", "name", "description", "created_at", "updated_at"];

    fn id(&self) -> i64 {
        self.id
    }
}

impl ResourceEntity for Category {
    const RESOURCE: Resource = Resource::Categories;
    const SEARCHABLE: &'static [&'static str] = &["name", "description"];
    const DEFAULT_ORDER: &'static str = "name asc";
    const CASCADE: &'static [(&'static str, &'static str)] = &[(LINK_TABLE, "category_id")];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCategory {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Validate for CreateCategory {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::new();
        errors.length("name", &self.name, 1, 100);
        if let Some(description) = &self.description {
            errors.max_length("description", description, 500);
        }
        errors.into_vec()
    }
}

impl WriteInput<Category> for CreateCategory {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCategory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

impl Validate for UpdateCategory {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            errors.length("name", name, 1, 100);
        }
        if let Some(Some(description)) = &self.description {
            errors.max_length("description", description, 500);
        }
        errors.into_vec()
    }
}

impl WriteInput<Category> for UpdateCategory {}

pub type CategoriesService = Crud<Category, CreateCategory, UpdateCategory>;

pub fn service(store: Arc<dyn Store>) -> CategoriesService {
    Crud::builder(store)
        .create_rule(Unique::new(
            "categories",
            "name",
            |dto: &CreateCategory| Some(Value::from(dto.name.as_str())),
            |_| None,
        ))
        .update_rule(Unique::new(
            "categories",
            "name",
            |dto: &Update<UpdateCategory>| dto.changes.name.as_deref().map(Value::from),
            |dto| Some(dto.id),
        ))
        .build()
}
