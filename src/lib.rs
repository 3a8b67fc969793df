//! License Admin - server side of a multi-tenant license/user admin console
//!
//! Lists, mutates and aggregates per-application users and licenses held by
//! a remote data service, behind a read-through TTL cache with prefix
//! invalidation.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod service;

pub use api::{create_router, AppState};
pub use cache::SharedCache;
pub use config::Config;
pub use service::AdminService;
