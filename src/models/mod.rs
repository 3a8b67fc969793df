//! Request, response and domain models for the admin API
//!
//! DTOs used for serializing/deserializing HTTP bodies, and the normalized
//! records the admin service returns and caches.

pub mod domain;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use domain::{
    AppUsage, AppUser, Application, License, LicenseStats, Page, RecordKind, UserStats,
    UserStatus,
};
pub use requests::{
    GenerateLicensesRequest, LicenseCodeRequest, ListQuery, RecordQuery, RedeemRequest,
    StatsQuery, UpdateStatusRequest, MAX_GENERATE_COUNT,
};
pub use responses::{
    CacheStatsResponse, DeleteResponse, HealthResponse, RedeemResponse, VerifyResponse,
};
