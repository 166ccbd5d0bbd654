//! Services layer for auth-service.
//!
//! Credential store access, the two token trust domains and the
//! authentication, authorization and audit services built on them.

pub mod audit;
pub mod auth;
pub mod bootstrap;
pub mod database;
pub mod epoch;
pub mod error;
pub mod jwt;
pub mod memory_store;
pub mod resolver;
pub mod service_auth;

pub use audit::AuditLogger;
pub use auth::{AuthService, AuthenticatedUser, ValidatedIdentity};
pub use database::{CredentialStore, Database, REQUIRED_TABLES};
pub use epoch::InvalidationEpoch;
pub use error::AuthError;
pub use jwt::{IssuedToken, RoleGrant, ServiceClaims, ServiceTokenService, UserClaims, UserTokenService};
pub use memory_store::MockCredentialStore;
pub use resolver::PermissionResolver;
pub use service_auth::{allow_list_permits, ServiceAuthService, ServiceIdentity, ServiceSession};
