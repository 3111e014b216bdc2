pub mod auth;
pub mod response;

pub use auth::{extract_bearer, hinted_auth_middleware, jwt_auth_middleware, require_admin_middleware};
pub use response::{ApiResponse, ApiResult};
