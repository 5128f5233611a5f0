// Resource services: entities, DTOs and their pipelines

pub mod analytics;
pub mod categories;
pub mod crud;
pub mod large_table;
pub mod pokemon;
pub mod posts;
pub mod profiles;
pub mod users;

use std::sync::Arc;

use crate::database::Store;

pub use analytics::AnalyticsService;
pub use categories::CategoriesService;
pub use crud::{CrudService, ResourceEntity, WriteInput};
pub use large_table::LargeTableService;
pub use pokemon::PokemonService;
pub use posts::PostsService;
pub use profiles::ProfilesService;
pub use users::UsersService;

/// Every resource service, built once over a shared store
#[derive(Clone)]
pub struct Services {
    pub users: Arc<UsersService>,
    pub posts: Arc<PostsService>,
    pub categories: Arc<CategoriesService>,
    pub pokemon: Arc<PokemonService>,
    pub profiles: Arc<ProfilesService>,
    pub large_table: Arc<LargeTableService>,
    pub analytics: Arc<AnalyticsService>,
}

impl Services {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            users: Arc::new(users::service(store.clone())),
            posts: Arc::new(posts::service(store.clone())),
            categories: Arc::new(categories::service(store.clone())),
            pokemon: Arc::new(pokemon::service(store.clone())),
            profiles: Arc::new(profiles::service(store.clone())),
            large_table: Arc::new(large_table::service(store.clone())),
            analytics: Arc::new(AnalyticsService::new(store)),
        }
    }
}
