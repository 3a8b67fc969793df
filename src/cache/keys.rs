//! Cache Key Module
//!
//! Deterministic key construction from resource class, tenant scope and
//! request parameters, plus the TTL policy attached to each resource class.
//!
//! Key layout: `{resource}:{tenant}[:{segment}...]`, for example
//! `users:productivity:l20:o0` or `stats:licenses:all:used`. Tenant names
//! and free-form segments are escaped so that `:` never appears inside a
//! segment, which keeps the mapping injective and makes tenant prefixes
//! exact.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Separator between key segments.
pub const SEPARATOR: char = ':';

/// Tenant sentinel used for unscoped (all applications) requests.
pub const ALL_TENANTS: &str = "all";

// == TTL Presets ==
/// Application catalogs change rarely.
pub const APPLICATIONS_TTL: Duration = Duration::from_secs(5 * 60);
/// List views tolerate moderate staleness.
pub const LIST_TTL: Duration = Duration::from_secs(30);
/// Stats are cheap to recompute and should track mutations closely.
pub const STATS_TTL: Duration = Duration::from_secs(20);

// == Resource Class ==
/// A logical cacheable entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Applications,
    Users,
    Licenses,
    UserStats,
    LicenseStats,
    /// Per-user drill-down rows kept by one application
    UserRecords,
}

impl ResourceClass {
    /// Key namespace for this class.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceClass::Applications => "applications",
            ResourceClass::Users => "users",
            ResourceClass::Licenses => "licenses",
            ResourceClass::UserStats => "stats:users",
            ResourceClass::LicenseStats => "stats:licenses",
            ResourceClass::UserRecords => "records",
        }
    }

    /// Fixed TTL for entries of this class.
    pub fn ttl(self) -> Duration {
        match self {
            ResourceClass::Applications => APPLICATIONS_TTL,
            ResourceClass::Users | ResourceClass::Licenses | ResourceClass::UserRecords => LIST_TTL,
            ResourceClass::UserStats | ResourceClass::LicenseStats => STATS_TTL,
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Tenant Scope ==
/// Normalized tenant (downstream application) a request is scoped to.
///
/// Empty, whitespace-only and absent names all mean "every application", as
/// does the reserved name `all`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TenantScope {
    All,
    App(String),
}

impl TenantScope {
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed == ALL_TENANTS {
            TenantScope::All
        } else {
            TenantScope::App(trimmed.to_string())
        }
    }

    pub fn from_option(name: Option<&str>) -> Self {
        name.map(Self::from_name).unwrap_or(TenantScope::All)
    }

    /// The application name to filter on, `None` when unscoped.
    pub fn app_name(&self) -> Option<&str> {
        match self {
            TenantScope::All => None,
            TenantScope::App(name) => Some(name.as_str()),
        }
    }

    /// Escaped key segment for this scope.
    pub fn key_segment(&self) -> String {
        match self {
            TenantScope::All => ALL_TENANTS.to_string(),
            TenantScope::App(name) => escape_segment(name),
        }
    }
}

impl From<&str> for TenantScope {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

impl From<Option<&str>> for TenantScope {
    fn from(name: Option<&str>) -> Self {
        Self::from_option(name)
    }
}

// == Pagination ==
/// Limit/offset window of a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    fn key_segments(&self) -> [String; 2] {
        [format!("l{}", self.limit), format!("o{}", self.offset)]
    }
}

// == Key Builder ==
/// Incremental builder for cache keys.
///
/// ```ignore
/// let key = KeyBuilder::new(ResourceClass::Users, &TenantScope::from("app1"))
///     .page(Pagination::new(20, 0))
///     .build();
/// assert_eq!(key, "users:app1:l20:o0");
/// ```
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    key: String,
}

impl KeyBuilder {
    pub fn new(resource: ResourceClass, tenant: &TenantScope) -> Self {
        let mut key = String::with_capacity(48);
        key.push_str(resource.as_str());
        key.push(SEPARATOR);
        key.push_str(&tenant.key_segment());
        Self { key }
    }

    /// Appends the pagination window.
    pub fn page(mut self, page: Pagination) -> Self {
        for segment in page.key_segments() {
            self.push_raw(&segment);
        }
        self
    }

    /// Appends a free-form segment, escaped.
    pub fn segment(mut self, value: &str) -> Self {
        let escaped = escape_segment(value);
        self.push_raw(&escaped);
        self
    }

    /// Appends a `name=value` qualifier, both sides escaped.
    pub fn param(mut self, name: &str, value: &str) -> Self {
        let qualifier = format!("{}={}", escape_segment(name), escape_segment(value));
        self.push_raw(&qualifier);
        self
    }

    pub fn build(self) -> String {
        self.key
    }

    fn push_raw(&mut self, segment: &str) {
        self.key.push(SEPARATOR);
        self.key.push_str(segment);
    }
}

// == Build Key ==
/// Builds the key for a resource, tenant and optional pagination window.
pub fn build_key(
    resource: ResourceClass,
    tenant: &TenantScope,
    page: Option<Pagination>,
) -> String {
    let builder = KeyBuilder::new(resource, tenant);
    match page {
        Some(page) => builder.page(page).build(),
        None => builder.build(),
    }
}

// == Tenant Prefix ==
/// Prefix covering every key of `resource` for `tenant`.
///
/// Ends with the separator, so `users:app1:` does not match keys of tenant
/// `app10`.
pub fn tenant_prefix(resource: ResourceClass, tenant: &TenantScope) -> String {
    let mut prefix = KeyBuilder::new(resource, tenant).build();
    prefix.push(SEPARATOR);
    prefix
}

/// Escapes `%`, `=` and the separator so a segment can never contain `:`.
fn escape_segment(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            SEPARATOR => escaped.push_str("%3A"),
            '=' => escaped.push_str("%3D"),
            other => escaped.push(other),
        }
    }
    escaped
}
