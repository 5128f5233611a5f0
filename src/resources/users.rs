use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::database::{Entity, Store};
use crate::pipeline::FieldError;
use crate::resources::crud::{Crud, ResourceEntity, Update, WriteInput};
use crate::rules::{nullable, FieldErrors, Unique, Validate};
use crate::types::{Resource, Role};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &["id", "email", "name", "role", "created_at", "updated_at"];

    fn id(&self) -> i64 {
        self.id
    }
}

impl ResourceEntity for User {
    const RESOURCE: Resource = Resource::Users;
    const SEARCHABLE: &'static [&'static str] = &["email", "name"];
    const RESTRICT: &'static [(&'static str, &'static str)] = &[("posts", "author_id"), ("profiles", "user_id")];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUser {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl Validate for CreateUser {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::new();
        errors.email("email", &self.email);
        if let Some(name) = &self.name {
            errors.max_length("name", name, 100);
        }
        errors.into_vec()
    }
}

impl WriteInput<User> for CreateUser {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl Validate for UpdateUser {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::new();
        if let Some(email) = &self.email {
            errors.email("email", email);
        }
        if let Some(Some(name)) = &self.name {
            errors.max_length("name", name, 100);
        }
        errors.into_vec()
    }
}

impl WriteInput<User> for UpdateUser {}

pub type UsersService = Crud<User, CreateUser, UpdateUser>;

pub fn service(store: Arc<dyn Store>) -> UsersService {
    Crud::builder(store)
        .create_rule(Unique::new(
            "users",
            "email",
            |dto: &CreateUser| Some(Value::from(dto.email.as_str())),
            |_| None,
        ))
        .update_rule(Unique::new(
            "users",
            "email",
            |dto: &Update<UpdateUser>| dto.changes.email.as_deref().map(Value::from),
            |dto| Some(dto.id),
        ))
        .build()
}
