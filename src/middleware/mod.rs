pub mod auth;
pub mod extract;
pub mod response;

pub use auth::{auth_middleware, extract_jwt_from_headers};
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use response::{ApiResponse, ApiResult};
