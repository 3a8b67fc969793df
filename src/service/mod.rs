//! Admin Service
//!
//! Per-resource operations of the console. Every read goes through the
//! shared cache; every write goes through the invalidation coordinator so
//! the views it made stale are dropped once the write has succeeded.

mod licenses;
mod records;
mod stats;
mod users;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::backend::{DataService, Mutation, Query, APPLICATIONS_TABLE};
use crate::cache::{Pagination, ResourceClass, SharedCache, TenantScope};
use crate::error::{AdminError, DataError, Result};
use crate::models::Application;

pub use licenses::generate_license_code;
pub use records::DateRange;
pub use stats::{derive_license_stats, derive_user_stats};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

// == Admin Service ==
#[derive(Clone)]
pub struct AdminService {
    data: Arc<dyn DataService>,
    cache: SharedCache,
    default_page_size: u32,
    max_page_size: u32,
}

impl AdminService {
    pub fn new(data: Arc<dyn DataService>, cache: SharedCache) -> Self {
        Self {
            data,
            cache,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    /// Overrides the page size used when a listing gives no limit, and the
    /// largest limit accepted.
    pub fn with_page_sizes(mut self, default_page_size: u32, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self.default_page_size = default_page_size.clamp(1, self.max_page_size);
        self
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Resolves a requested window. Oversized limits are clamped.
    pub fn page(&self, limit: Option<u32>, offset: Option<u32>) -> Result<Pagination> {
        let limit = match limit {
            Some(0) => {
                return Err(AdminError::InvalidRequest(
                    "limit must be greater than zero".to_string(),
                ))
            }
            Some(limit) => limit.min(self.max_page_size),
            None => self.default_page_size,
        };
        Ok(Pagination::new(limit, offset.unwrap_or(0)))
    }

    // == Applications ==
    /// Active applications ordered by display name.
    pub async fn applications(&self) -> Result<Vec<Application>> {
        self.cache
            .get_or_fetch(ResourceClass::Applications, &TenantScope::All, None, || {
                self.fetch_applications()
            })
            .await
    }

    async fn fetch_applications(&self) -> Result<Vec<Application>> {
        let query = Query::table(APPLICATIONS_TABLE)
            .eq("is_active", true)
            .order_by("display_name", true);
        let rows = self.data.fetch(&query).await.map_err(AdminError::fetch)?;
        let apps: Vec<Application> = decode_rows(rows)?;
        Ok(apps.into_iter().map(Application::normalized).collect())
    }

    /// Runs one write against the data service.
    async fn write(&self, mutation: Mutation) -> Result<Vec<Value>> {
        self.data
            .mutate(mutation)
            .await
            .map_err(AdminError::mutation)
    }
}

/// Decodes data service rows into records; shape mismatches are fetch
/// failures.
fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter().map(decode_row).collect()
}

fn decode_row<T: DeserializeOwned>(row: Value) -> Result<T> {
    serde_json::from_value(row).map_err(|e| AdminError::fetch(DataError::from(e)))
}

/// First row of a write result, or NotFound when the write matched nothing.
fn first_row<T: DeserializeOwned>(rows: Vec<Value>, what: &str, id: &str) -> Result<T> {
    match rows.into_iter().next() {
        Some(row) => serde_json::from_value(row)
            .map_err(|e| AdminError::mutation(DataError::from(e))),
        None => Err(AdminError::NotFound(format!("{} {}", what, id))),
    }
}

/// Decodes the rows a write returned.
fn decode_written<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| AdminError::mutation(DataError::from(e)))
        })
        .collect()
}

/// Path ids are numeric for integer keys, text otherwise.
fn id_value(id: &str) -> Value {
    id.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(id.to_string()))
}
