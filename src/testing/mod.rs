use std::sync::Arc;

use crate::database::{MemoryStore, Store};
use crate::resources::categories::{Category, CreateCategory};
use crate::resources::posts::{CreatePost, Post};
use crate::resources::users::{CreateUser, User};
use crate::resources::{CrudService, Services};
use crate::types::{Actor, Role};

/// Fresh memory store with services and seeding helpers
pub struct TestContext {
    pub store: Arc<dyn Store>,
    pub services: Services,
}

impl TestContext {
    pub fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let services = Services::new(store.clone());
        Self { store, services }
    }

    pub fn admin() -> Actor {
        Actor::new("1", Role::Admin)
    }

    pub fn editor() -> Actor {
        Actor::new("2", Role::Editor)
    }

    pub fn viewer() -> Actor {
        Actor::new("3", Role::Viewer)
    }

    pub async fn user(&self, email: &str, role: Role) -> User {
        let input = CreateUser {
            email: email.to_string(),
            name: None,
            role,
        };
        self.services
            .users
            .create(Self::admin(), input)
            .await
            .unwrap_or_else(|e| panic!("seeding user {}: {}", email, e))
    }

    pub async fn category(&self, name: &str) -> Category {
        let input = CreateCategory {
            name: name.to_string(),
            description: None,
        };
        self.services
            .categories
            .create(Self::admin(), input)
            .await
            .unwrap_or_else(|e| panic!("seeding category {}: {}", name, e))
    }

    pub async fn post(&self, author_id: i64, title: &str, category_ids: Vec<i64>) -> Post {
        let input = CreatePost {
            title: title.to_string(),
            content: None,
            published: false,
            author_id,
            category_ids,
        };
        self.services
            .posts
            .create(Self::admin(), input)
            .await
            .unwrap_or_else(|e| panic!("seeding post {}: {}", title, e))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
