//! In-memory data service.
//!
//! Holds tables of JSON rows and implements the license stored procedures
//! locally. Used when no remote data service is configured and by tests,
//! which also use its call counters and failure switches.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    DataService, Mutation, Query, APPLICATIONS_TABLE, CASHFLOW_BUDGETS_TABLE,
    CASHFLOW_CATEGORIES_TABLE, CASHFLOW_GOALS_TABLE, CASHFLOW_TRANSACTIONS_TABLE, LICENSES_TABLE,
    PRODUCTIVITY_TASKS_TABLE, REDEEM_LICENSE_RPC, USERS_TABLE, VERIFY_LICENSE_RPC,
};
use crate::error::DataError;

#[derive(Debug, Default)]
pub struct MemoryDataService {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    next_id: AtomicI64,
    fetch_calls: AtomicUsize,
    count_calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryDataService {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    /// Two applications with a handful of users and licenses.
    pub async fn with_demo_data() -> Self {
        let service = Self::new();
        service
            .seed(
                APPLICATIONS_TABLE,
                vec![
                    json!({"name": "productivity", "display_name": "Productivity", "description": "Daily task tracker", "is_active": true}),
                    json!({"name": "cashflow", "display_name": "Cashflow Manager", "description": "Personal finance", "is_active": true}),
                    json!({"name": "legacy", "display_name": "Legacy", "is_active": false}),
                ],
            )
            .await;
        service
            .seed(
                USERS_TABLE,
                vec![
                    json!({"app_name": "productivity", "email": "ana@example.com", "name": "Ana", "status": "active"}),
                    json!({"app_name": "productivity", "email": "budi@example.com", "name": "Budi", "status": "inactive"}),
                    json!({"app_name": "cashflow", "email": "citra@example.com", "name": "Citra", "status": "active"}),
                ],
            )
            .await;
        service
            .seed(
                LICENSES_TABLE,
                vec![
                    json!({"app_name": "productivity", "license_code": "PROD-0000-0000-0001", "is_used": false}),
                    json!({"app_name": "productivity", "license_code": "PROD-0000-0000-0002", "is_used": false}),
                    json!({"app_name": "cashflow", "license_code": "CASH-0000-0000-0001", "is_used": false}),
                ],
            )
            .await;
        service.seed_user_records().await;
        service
    }

    /// Rows the applications keep per user, keyed by their own user ids.
    async fn seed_user_records(&self) {
        self.seed(
            CASHFLOW_TRANSACTIONS_TABLE,
            vec![
                json!({"user_id": "u-citra", "type": "income", "amount": 5000, "transaction_date": "2024-02-20"}),
                json!({"user_id": "u-citra", "type": "expense", "amount": 120, "transaction_date": "2024-03-28"}),
                json!({"user_id": "u-citra", "type": "expense", "amount": 45, "transaction_date": "2024-03-15"}),
                json!({"user_id": "u-other", "type": "expense", "amount": 9, "transaction_date": "2024-03-20"}),
            ],
        )
        .await;
        self.seed(
            CASHFLOW_BUDGETS_TABLE,
            vec![json!({"user_id": "u-citra", "name": "Groceries", "amount": 400, "period": "monthly"})],
        )
        .await;
        self.seed(
            CASHFLOW_GOALS_TABLE,
            vec![json!({"user_id": "u-citra", "name": "Emergency fund", "target_amount": 3000, "current_amount": 800})],
        )
        .await;
        self.seed(
            CASHFLOW_CATEGORIES_TABLE,
            vec![
                json!({"user_id": "u-citra", "name": "Salary", "type": "income", "is_active": true}),
                json!({"user_id": "u-citra", "name": "Archived", "type": "expense", "is_active": false}),
                json!({"user_id": "u-citra", "name": "Food", "type": "expense", "is_active": true}),
            ],
        )
        .await;
        self.seed(
            PRODUCTIVITY_TASKS_TABLE,
            vec![
                json!({"user_id": "u-ana", "title": "Plan week", "task_date": "2024-03-01", "is_completed": true}),
                json!({"user_id": "u-ana", "title": "Review notes", "task_date": "2024-03-02", "is_completed": false}),
            ],
        )
        .await;
    }

    /// Inserts rows directly, assigning ids and timestamps.
    pub async fn seed(&self, table: &str, rows: Vec<Value>) -> Vec<Value> {
        let mut tables = self.tables.write().await;
        let stored = tables.entry(table.to_string()).or_default();
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let row = self.prepare_row(row);
            stored.push(row.clone());
            inserted.push(row);
        }
        inserted
    }

    /// Number of `fetch` calls served so far.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of `count` calls served so far.
    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    /// Makes `fetch` and `count` fail until switched off.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `mutate` and `call` fail until switched off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn prepare_row(&self, row: Value) -> Value {
        let mut object = match row {
            Value::Object(object) => object,
            other => {
                let mut object = Map::new();
                object.insert("value".to_string(), other);
                object
            }
        };
        if !object.contains_key("id") {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            object.insert("id".to_string(), json!(id));
        }
        object
            .entry("created_at")
            .or_insert_with(|| json!(now_rfc3339()));
        Value::Object(object)
    }

    fn check_reads(&self) -> Result<(), DataError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DataError::Status {
                status: 503,
                message: "read failure injected".to_string(),
            });
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<(), DataError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DataError::Status {
                status: 503,
                message: "write failure injected".to_string(),
            });
        }
        Ok(())
    }

    async fn verify_license(&self, params: &Value) -> Result<Value, DataError> {
        let (app_name, code) = license_params(VERIFY_LICENSE_RPC, params)?;
        let tables = self.tables.read().await;
        let valid = tables
            .get(LICENSES_TABLE)
            .into_iter()
            .flatten()
            .find(|l| l["app_name"] == app_name && l["license_code"] == code)
            .map(|l| !is_true(&l["is_used"]) && !is_expired(l))
            .unwrap_or(false);
        Ok(Value::Bool(valid))
    }

    /// Marks the license used and returns it as a one-row result set.
    /// With `p_email` the user is created or reactivated and bound to it.
    async fn redeem_license(&self, params: &Value) -> Result<Value, DataError> {
        let (app_name, code) = license_params(REDEEM_LICENSE_RPC, params)?;
        let email = params.get("p_email").and_then(Value::as_str).map(str::to_string);
        let name = params.get("p_name").cloned().unwrap_or(Value::Null);

        let mut tables = self.tables.write().await;

        let license_idx = tables
            .get(LICENSES_TABLE)
            .and_then(|rows| {
                rows.iter()
                    .position(|l| l["app_name"] == app_name && l["license_code"] == code)
            })
            .ok_or_else(|| rpc_error(REDEEM_LICENSE_RPC, "LICENSE_NOT_FOUND"))?;
        {
            let license = &tables[LICENSES_TABLE][license_idx];
            if is_true(&license["is_used"]) {
                return Err(rpc_error(REDEEM_LICENSE_RPC, "LICENSE_ALREADY_USED"));
            }
            if is_expired(license) {
                return Err(rpc_error(REDEEM_LICENSE_RPC, "LICENSE_EXPIRED"));
            }
        }
        let license_id = tables[LICENSES_TABLE][license_idx]["id"].clone();
        let now = now_rfc3339();

        let used_by = match email {
            Some(email) => {
                let users = tables.entry(USERS_TABLE.to_string()).or_default();
                let existing = users
                    .iter()
                    .position(|u| u["app_name"] == app_name && u["email"] == email.as_str());
                match existing {
                    Some(idx) => {
                        let user = &mut users[idx];
                        user["status"] = json!("active");
                        user["license_id"] = license_id.clone();
                        user["updated_at"] = json!(now);
                        user["id"].clone()
                    }
                    None => {
                        let user = self.prepare_row(json!({
                            "app_name": app_name,
                            "email": email,
                            "name": name,
                            "status": "active",
                            "license_id": license_id,
                        }));
                        let id = user["id"].clone();
                        users.push(user);
                        id
                    }
                }
            }
            None => Value::Null,
        };

        let license = tables
            .get_mut(LICENSES_TABLE)
            .and_then(|rows| rows.get_mut(license_idx))
            .map(|license| {
                license["is_used"] = json!(true);
                license["used_by"] = used_by;
                license["used_at"] = json!(now);
                license.clone()
            })
            .unwrap_or(Value::Null);

        Ok(json!([license]))
    }
}

#[async_trait]
impl DataService for MemoryDataService {
    async fn fetch(&self, query: &Query) -> Result<Vec<Value>, DataError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        let tables = self.tables.read().await;
        let mut rows: Vec<Value> = tables
            .get(&query.table)
            .into_iter()
            .flatten()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(&a[&order.column], &b[&order.column]);
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        if let Some(page) = query.range {
            rows = rows
                .into_iter()
                .skip(page.offset as usize)
                .take(page.limit as usize)
                .collect();
        }

        debug!(table = %query.table, rows = rows.len(), "memory fetch");
        Ok(rows)
    }

    async fn count(&self, query: &Query) -> Result<u64, DataError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        let tables = self.tables.read().await;
        let count = tables
            .get(&query.table)
            .into_iter()
            .flatten()
            .filter(|row| query.matches(row))
            .count();
        Ok(count as u64)
    }

    async fn mutate(&self, mutation: Mutation) -> Result<Vec<Value>, DataError> {
        self.check_writes()?;

        match mutation {
            Mutation::Insert { table, rows } => Ok(self.seed(&table, rows).await),
            Mutation::Update {
                table,
                filters,
                patch,
            } => {
                let mut tables = self.tables.write().await;
                let mut updated = Vec::new();
                for row in tables.entry(table).or_default().iter_mut() {
                    let selected = filters.iter().all(|f| f.matches(&*row));
                    if selected {
                        if let (Value::Object(target), Value::Object(changes)) = (&mut *row, &patch)
                        {
                            for (key, value) in changes {
                                target.insert(key.clone(), value.clone());
                            }
                        }
                        updated.push(row.clone());
                    }
                }
                Ok(updated)
            }
            Mutation::Delete { table, filters } => {
                let mut tables = self.tables.write().await;
                let rows = tables.entry(table).or_default();
                let (removed, kept): (Vec<Value>, Vec<Value>) = rows
                    .drain(..)
                    .partition(|row| filters.iter().all(|f| f.matches(row)));
                *rows = kept;
                Ok(removed)
            }
        }
    }

    async fn call(&self, procedure: &str, params: Value) -> Result<Value, DataError> {
        self.check_writes()?;

        match procedure {
            VERIFY_LICENSE_RPC => self.verify_license(&params).await,
            REDEEM_LICENSE_RPC => self.redeem_license(&params).await,
            other => Err(DataError::UnknownRelation(other.to_string())),
        }
    }
}

fn license_params(procedure: &str, params: &Value) -> Result<(String, String), DataError> {
    let app_name = params["p_app_name"]
        .as_str()
        .ok_or_else(|| rpc_error(procedure, "p_app_name is required"))?;
    let code = params["p_license_code"]
        .as_str()
        .ok_or_else(|| rpc_error(procedure, "p_license_code is required"))?;
    Ok((app_name.to_string(), code.to_string()))
}

fn rpc_error(procedure: &str, message: &str) -> DataError {
    DataError::Rpc {
        procedure: procedure.to_string(),
        message: message.to_string(),
    }
}

fn is_true(value: &Value) -> bool {
    value.as_bool().unwrap_or(false)
}

fn is_expired(license: &Value) -> bool {
    license["expires_at"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|expires| expires.with_timezone(&Utc) < Utc::now())
        .unwrap_or(false)
}

/// Orders strings and numbers naturally; nulls sort last.
fn compare_values(a: &Value, b: &Value) -> CmpOrdering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Null, Value::Null) => CmpOrdering::Equal,
        (Value::Null, _) => CmpOrdering::Greater,
        (_, Value::Null) => CmpOrdering::Less,
        _ => CmpOrdering::Equal,
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
