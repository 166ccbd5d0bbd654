pub mod auth;
pub mod client;
pub mod service_auth;
pub mod token;

pub use auth::{auth_middleware, AuthUser};
pub use client::ClientMeta;
pub use service_auth::{service_auth_middleware, ServiceCaller};
pub use token::{extract_service_token, extract_user_token};
