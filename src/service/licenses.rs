//! License listing, generation, deletion, verification and redemption.

use std::collections::HashSet;

use rand::Rng;
use serde_json::{json, Value};
use tracing::info;

use super::{decode_row, decode_rows, decode_written, first_row, id_value, AdminService};
use crate::backend::{
    Filter, Mutation, Query, LICENSES_TABLE, REDEEM_LICENSE_RPC, VERIFY_LICENSE_RPC,
};
use crate::cache::{MutationKind, Pagination, ResourceClass, TenantScope};
use crate::error::{AdminError, DataError, LicenseRejection, Result};
use crate::models::{License, Page, MAX_GENERATE_COUNT};

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 16;
const CODE_GROUP: usize = 4;

/// Random license code: 16 characters from `A-Z0-9` in dash-separated
/// groups of four, e.g. `Q7ZK-2M9D-LX4P-0TRE`.
pub fn generate_license_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::with_capacity(CODE_LENGTH + CODE_LENGTH / CODE_GROUP - 1);
    for i in 0..CODE_LENGTH {
        if i > 0 && i % CODE_GROUP == 0 {
            code.push('-');
        }
        let idx = rng.gen_range(0..CODE_CHARSET.len());
        code.push(CODE_CHARSET[idx] as char);
    }
    code
}

impl AdminService {
    // == List Licenses ==
    pub async fn list_licenses(&self, app: Option<&str>, page: Pagination) -> Result<Page<License>> {
        let tenant = TenantScope::from_option(app);
        self.cache
            .get_or_fetch(ResourceClass::Licenses, &tenant, Some(page), || {
                self.fetch_licenses(&tenant, page)
            })
            .await
    }

    async fn fetch_licenses(&self, tenant: &TenantScope, page: Pagination) -> Result<Page<License>> {
        let query = Query::table(LICENSES_TABLE)
            .eq_opt("app_name", tenant.app_name())
            .order_by("created_at", false)
            .range(page);
        let rows = self.data.fetch(&query).await.map_err(AdminError::fetch)?;
        Ok(Page {
            items: decode_rows(rows)?,
            limit: page.limit,
            offset: page.offset,
        })
    }

    pub async fn find_license(&self, id: &str) -> Result<License> {
        let query = Query::table(LICENSES_TABLE).eq("id", id_value(id));
        let rows = self.data.fetch(&query).await.map_err(AdminError::fetch)?;
        match rows.into_iter().next() {
            Some(row) => decode_row(row),
            None => Err(AdminError::NotFound(format!("license {}", id))),
        }
    }

    // == Generate Licenses ==
    /// Inserts `count` fresh, unused codes for one application.
    pub async fn generate_licenses(&self, app_name: &str, count: u32) -> Result<Vec<License>> {
        let tenant = TenantScope::from_name(app_name);
        let Some(app) = tenant.app_name() else {
            return Err(AdminError::InvalidRequest(
                "app_name must name a single application".to_string(),
            ));
        };
        if count == 0 || count > MAX_GENERATE_COUNT {
            return Err(AdminError::InvalidRequest(format!(
                "count must be between 1 and {}",
                MAX_GENERATE_COUNT
            )));
        }

        let rows: Vec<Value> = {
            let mut rng = rand::thread_rng();
            let mut codes = HashSet::with_capacity(count as usize);
            while codes.len() < count as usize {
                codes.insert(generate_license_code(&mut rng));
            }
            codes
                .into_iter()
                .map(|code| json!({"app_name": app, "license_code": code, "is_used": false}))
                .collect()
        };

        let mutation = Mutation::Insert {
            table: LICENSES_TABLE.to_string(),
            rows,
        };
        let inserted = self
            .cache
            .mutate_then_invalidate(MutationKind::GenerateLicenses, &tenant, || {
                self.write(mutation)
            })
            .await?;

        info!(app, count, "licenses generated");
        decode_written(inserted)
    }

    // == Delete License ==
    pub async fn delete_license(&self, id: &str) -> Result<License> {
        let license = self.find_license(id).await?;
        let tenant = TenantScope::from_name(&license.app_name);

        let mutation = Mutation::Delete {
            table: LICENSES_TABLE.to_string(),
            filters: vec![Filter::eq("id", id_value(id))],
        };
        let rows = self
            .cache
            .mutate_then_invalidate(MutationKind::DeleteLicense, &tenant, || {
                self.write(mutation)
            })
            .await?;

        info!(license = id, app = %license.app_name, "license deleted");
        first_row(rows, "license", id)
    }

    // == Verify License ==
    /// Whether a code exists for the application and can still be redeemed.
    /// Always asks the data service.
    ///
    /// Any truthy result counts as valid, so procedures that return a row
    /// or a result set work as well as ones that return a boolean.
    pub async fn verify_license(&self, app_name: &str, license_code: &str) -> Result<bool> {
        let params = json!({
            "p_app_name": app_name.trim(),
            "p_license_code": license_code.trim(),
        });
        let result = self
            .data
            .call(VERIFY_LICENSE_RPC, params)
            .await
            .map_err(AdminError::fetch)?;
        Ok(is_truthy(&result))
    }

    // == Redeem License ==
    /// Marks a license as used and returns the first row the procedure
    /// reports, if any. Clears both the license and user views of the
    /// application.
    ///
    /// `email` and `name` are only sent when an email is given, for data
    /// services whose procedure also binds the license to a user.
    pub async fn redeem_license(
        &self,
        app_name: &str,
        license_code: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<Option<Value>> {
        let tenant = TenantScope::from_name(app_name);
        let Some(app) = tenant.app_name() else {
            return Err(AdminError::InvalidRequest(
                "app_name must name a single application".to_string(),
            ));
        };

        let mut params = json!({
            "p_app_name": app,
            "p_license_code": license_code.trim(),
        });
        if let Some(email) = email.map(str::trim) {
            params["p_email"] = json!(email);
            params["p_name"] = json!(name);
        }

        let result = self
            .cache
            .mutate_then_invalidate(MutationKind::RedeemLicense, &tenant, || {
                self.call_redeem(params)
            })
            .await?;

        info!(app, email = email.unwrap_or("-"), "license redeemed");
        Ok(first_result_row(result))
    }

    async fn call_redeem(&self, params: Value) -> Result<Value> {
        self.data
            .call(REDEEM_LICENSE_RPC, params)
            .await
            .map_err(redeem_error)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Set-returning procedures reply with an array; scalar ones with a row.
fn first_result_row(value: Value) -> Option<Value> {
    match value {
        Value::Array(rows) => rows.into_iter().next(),
        Value::Null => None,
        row => Some(row),
    }
}

/// Known rejection codes become license errors; anything else is a failed
/// write.
fn redeem_error(err: DataError) -> AdminError {
    if let DataError::Rpc { message, .. } = &err {
        if let Some(rejection) = LicenseRejection::from_message(message) {
            return AdminError::License(rejection);
        }
    }
    AdminError::mutation(err)
}
