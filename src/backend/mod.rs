//! Data Service Module
//!
//! The remote table store and stored procedures the admin service reads
//! from and writes to. Everything behind this trait is an external
//! collaborator: the cache never assumes more than its contract.

mod memory;
mod query;
mod rest;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DataError;

pub use memory::MemoryDataService;
pub use query::{Filter, FilterOp, Mutation, Order, Query};
pub use rest::RestDataService;

// == Table and Procedure Names ==
pub const APPLICATIONS_TABLE: &str = "applications";
pub const USERS_TABLE: &str = "admin_app_users";
pub const LICENSES_TABLE: &str = "admin_licenses";

pub const CASHFLOW_TRANSACTIONS_TABLE: &str = "cashflow_transactions";
pub const CASHFLOW_BUDGETS_TABLE: &str = "cashflow_budgets";
pub const CASHFLOW_GOALS_TABLE: &str = "cashflow_goals";
pub const CASHFLOW_CATEGORIES_TABLE: &str = "cashflow_categories";
pub const PRODUCTIVITY_TASKS_TABLE: &str = "productivity_task_instances";

pub const VERIFY_LICENSE_RPC: &str = "verify_license";
pub const REDEEM_LICENSE_RPC: &str = "redeem_license";

// == Data Service ==
/// Generic query/RPC client for the remote data service.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Idempotent select returning matching rows.
    async fn fetch(&self, query: &Query) -> Result<Vec<Value>, DataError>;

    /// Exact number of rows matching the query's filters.
    async fn count(&self, query: &Query) -> Result<u64, DataError>;

    /// Insert, update or delete; returns the affected rows.
    async fn mutate(&self, mutation: Mutation) -> Result<Vec<Value>, DataError>;

    /// Invokes a stored procedure.
    async fn call(&self, procedure: &str, params: Value) -> Result<Value, DataError>;
}
