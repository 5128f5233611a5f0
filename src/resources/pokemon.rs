use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::{Entity, Store};
use crate::pipeline::FieldError;
use crate::resources::crud::{Crud, ResourceEntity, Update, WriteInput};
use crate::rules::{nullable, FieldErrors, Unique, Validate};
use crate::types::Resource;

pub const TYPES: &[&str] = &[
    "normal", "fire", "water", "electric", "grass", "ice", "fighting", "poison", "ground",
    "flying", "psychic", "bug", "rock", "ghost", "dragon", "dark", "steel", "fairy",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pokemon {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub hp: i64,
    pub attack: i64,
    pub defense: i64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Pokemon {
    const TABLE: &'static str = "pokemon";
    const COLUMNS: &'static [&'static str] =
        &["id", "name", "type", "hp", "attack", "defense", "image_url", "created_at", "updated_at"];

    fn id(&self) -> i64 {
        self.id
    }
}

impl ResourceEntity for Pokemon {
    const RESOURCE: Resource = Resource::Pokemon;
    const SEARCHABLE: &'static [&'static str] = &["name", "type"];
    const DEFAULT_ORDER: &'static str = "name asc";
}

fn check_stat(errors: &mut FieldErrors, field: &str, value: Option<i64>) {
    if let Some(v) = value {
        errors.range(field, v, 1, 255);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePokemon {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub hp: i64,
    pub attack: i64,
    pub defense: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Validate for CreatePokemon {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::new();
        errors.length("name", &self.name, 1, 50);
        errors.one_of("type", &self.kind, TYPES);
        check_stat(&mut errors, "hp", Some(self.hp));
        check_stat(&mut errors, "attack", Some(self.attack));
        check_stat(&mut errors, "defense", Some(self.defense));
        if let Some(url) = &self.image_url {
            errors.http_url("image_url", url);
        }
        errors.into_vec()
    }
}

impl WriteInput<Pokemon> for CreatePokemon {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePokemon {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defense: Option<i64>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
}

impl Validate for UpdatePokemon {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            errors.length("name", name, 1, 50);
        }
        if let Some(kind) = &self.kind {
            errors.one_of("type", kind, TYPES);
        }
        check_stat(&mut errors, "hp", self.hp);
        check_stat(&mut errors, "attack", self.attack);
        check_stat(&mut errors, "defense", self.defense);
        if let Some(Some(url)) = &self.image_url {
            errors.http_url("image_url", url);
        }
        errors.into_vec()
    }
}

impl WriteInput<Pokemon> for UpdatePokemon {}

pub type PokemonService = Crud<Pokemon, CreatePokemon, UpdatePokemon>;

pub fn service(store: Arc<dyn Store>) -> PokemonService {
    Crud::builder(store)
        .create_rule(Unique::new(
            "pokemon",
            "name",
            |dto: &CreatePokemon| Some(Value::from(dto.name.as_str())),
            |_| None,
        ))
        .update_rule(Unique::new(
            "pokemon",
            "name",
            |dto: &Update<UpdatePokemon>| dto.changes.name.as_deref().map(Value::from),
            |dto| Some(dto.id),
        ))
        .build()
}
