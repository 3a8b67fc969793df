//! Cache Module
//!
//! Read-through TTL cache with prefix invalidation in front of the data
//! service.

mod entry;
mod invalidation;
pub mod keys;
mod read_through;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use invalidation::{invalidation_prefixes, MutationKind};
pub use keys::{build_key, tenant_prefix, KeyBuilder, Pagination, ResourceClass, TenantScope};
pub use read_through::SharedCache;
pub use stats::CacheStats;
pub use store::TtlStore;
