pub mod auth;
pub mod response;

pub use auth::{jwt_auth_middleware, AUTH_COOKIE};
pub use response::{ApiResponse, ApiResult};
