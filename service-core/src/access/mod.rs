//! Permission-aware data access.
//!
//! A [`PermissionAwareManager`] wraps one [`RecordStore`] and hands out an
//! [`AccessHandle`] per caller. The handle enforces the caller's permission
//! set in one of two ways, chosen from the store's [`CapabilityProfile`]:
//!
//! * engines with native row security and roles get a role switch before
//!   each statement; visibility is left to the installed policies.
//! * every other engine gets the per-resource predicates from the
//!   [`PolicyRegistry`] injected into reads and writes, and writes are
//!   refused up front when the permission is missing.

mod capability;
mod context;
mod error;
mod manager;
mod memory;
mod mongo;
mod policy;
mod postgres;
mod predicate;
mod store;

pub use capability::{CapabilityProfile, Enforcement};
pub use context::{AccessContext, DEFAULT_DATABASE_ROLE};
pub use error::AccessError;
pub use manager::{AccessHandle, PermissionAwareManager};
pub use memory::MemoryRecordStore;
pub use mongo::MongoRecordStore;
pub use policy::{PolicyCommand, PolicyRegistry, ReadRule, ResourcePolicy, RlsPolicy, RoleView, RowScope, WriteOp};
pub use postgres::PgRecordStore;
pub use predicate::{Predicate, Scalar};
pub use store::{Record, RecordStore, StoreSession};
