pub mod auth;
pub mod json;
pub mod response;
pub mod restrict;

pub use auth::{extract_token, protect, CurrentUser, JWT_COOKIE};
pub use json::ApiJson;
pub use response::{ApiResponse, ApiResult};
pub use restrict::restrict_to;
