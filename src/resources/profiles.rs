use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::{Entity, Store};
use crate::pipeline::FieldError;
use crate::resources::crud::{Crud, ResourceEntity, Update, WriteInput};
use crate::rules::{nullable, FieldErrors, ReferenceExists, Unique, Validate};
use crate::types::Resource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Profile {
    const TABLE: &'static str = "profiles";
    const COLUMNS: &'static [&'static str] = &["id", "user_id", "bio", "avatar_url", "created_at", "updated_at"];

    fn id(&self) -> i64 {
        self.id
    }
}

impl ResourceEntity for Profile {
    const RESOURCE: Resource = Resource::Profiles;
    const SEARCHABLE: &'static [&'static str] = &["bio"];
}

fn check_fields(errors: &mut FieldErrors, bio: Option<&str>, avatar_url: Option<&str>) {
    if let Some(bio) = bio {
        errors.max_length("bio", bio, 500);
    }
    if let Some(url) = avatar_url {
        errors.http_url("avatar_url", url);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProfile {
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Validate for CreateProfile {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::new();
        check_fields(&mut errors, self.bio.as_deref(), self.avatar_url.as_deref());
        errors.into_vec()
    }
}

impl WriteInput<Profile> for CreateProfile {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<Option<String>>,
}

impl Validate for UpdateProfile {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::new();
        check_fields(
            &mut errors,
            self.bio.as_ref().and_then(|b| b.as_deref()),
            self.avatar_url.as_ref().and_then(|u| u.as_deref()),
        );
        errors.into_vec()
    }
}

impl WriteInput<Profile> for UpdateProfile {}

pub type ProfilesService = Crud<Profile, CreateProfile, UpdateProfile>;

pub fn service(store: Arc<dyn Store>) -> ProfilesService {
    Crud::builder(store)
        .create_rule(ReferenceExists::new("users", "user_id", |dto: &CreateProfile| Some(dto.user_id)))
        .create_rule(Unique::new(
            "profiles",
            "user_id",
            |dto: &CreateProfile| Some(Value::from(dto.user_id)),
            |_| None,
        ))
        .update_rule(ReferenceExists::new("users", "user_id", |dto: &Update<UpdateProfile>| {
            dto.changes.user_id
        }))
        .update_rule(Unique::new(
            "profiles",
            "user_id",
            |dto: &Update<UpdateProfile>| dto.changes.user_id.map(Value::from),
            |dto| Some(dto.id),
        ))
        .build()
}
