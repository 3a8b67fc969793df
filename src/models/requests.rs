//! Request DTOs for the admin API
//!
//! Query strings and JSON bodies accepted by the handlers. Each body type
//! validates itself before it reaches the admin service.

use serde::Deserialize;

/// Upper bound for one license generation request.
pub const MAX_GENERATE_COUNT: u32 = 1000;

/// Query string for paginated listings (`GET /users`, `GET /licenses`).
///
/// `app` absent or empty means every application.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub search: Option<String>,
}

/// Query string for the stats endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub app: Option<String>,
}

/// Query string for `GET /apps/:app/users/:id/:kind`.
///
/// `from` and `to` are inclusive dates on the record's own date column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

/// Request body for `PATCH /users/:id/status`
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Request body for `POST /licenses`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateLicensesRequest {
    pub app_name: String,
    pub count: u32,
}

impl GenerateLicensesRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.app_name.trim().is_empty() {
            return Some("app_name cannot be empty".to_string());
        }
        if self.count == 0 || self.count > MAX_GENERATE_COUNT {
            return Some(format!(
                "count must be between 1 and {}",
                MAX_GENERATE_COUNT
            ));
        }
        None
    }
}

/// Request body for `POST /licenses/verify`
#[derive(Debug, Clone, Deserialize)]
pub struct LicenseCodeRequest {
    pub app_name: String,
    pub license_code: String,
}

impl LicenseCodeRequest {
    pub fn validate(&self) -> Option<String> {
        validate_license_fields(&self.app_name, &self.license_code)
    }
}

/// Request body for `POST /licenses/redeem`
#[derive(Debug, Clone, Deserialize)]
pub struct RedeemRequest {
    pub app_name: String,
    pub license_code: String,
    /// Binds the license to this user when the data service supports it
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl RedeemRequest {
    pub fn validate(&self) -> Option<String> {
        if let Some(error) = validate_license_fields(&self.app_name, &self.license_code) {
            return Some(error);
        }
        if self.email.as_deref().is_some_and(|email| !email.contains('@')) {
            return Some("email must be a valid address".to_string());
        }
        None
    }
}

fn validate_license_fields(app_name: &str, license_code: &str) -> Option<String> {
    if app_name.trim().is_empty() {
        return Some("app_name cannot be empty".to_string());
    }
    if license_code.trim().is_empty() {
        return Some("license_code cannot be empty".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_deserialize_partial() {
        let query: ListQuery = serde_json::from_str(r#"{"app": "cashflow", "limit": 50}"#).unwrap();
        assert_eq!(query.app.as_deref(), Some("cashflow"));
        assert_eq!(query.limit, Some(50));
        assert!(query.offset.is_none());
        assert!(query.search.is_none());
    }

    #[test]
    fn test_generate_request_bounds() {
        let mut req = GenerateLicensesRequest {
            app_name: "cashflow".to_string(),
            count: 0,
        };
        assert!(req.validate().is_some());

        req.count = MAX_GENERATE_COUNT + 1;
        assert!(req.validate().is_some());

        req.count = 25;
        assert!(req.validate().is_none());

        req.app_name = "  ".to_string();
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_redeem_request_validation() {
        let json = r#"{"app_name": "cashflow", "license_code": "ABCD", "email": "x@y.z"}"#;
        let req: RedeemRequest = serde_json::from_str(json).unwrap();
        assert!(req.name.is_none());
        assert!(req.validate().is_none());

        let bad = RedeemRequest {
            email: Some("not-an-email".to_string()),
            ..req.clone()
        };
        assert!(bad.validate().is_some());

        let bare: RedeemRequest =
            serde_json::from_str(r#"{"app_name": "cashflow", "license_code": "ABCD"}"#).unwrap();
        assert!(bare.email.is_none());
        assert!(bare.validate().is_none());
    }

    #[test]
    fn test_license_code_request_empty_code() {
        let req = LicenseCodeRequest {
            app_name: "cashflow".to_string(),
            license_code: String::new(),
        };
        assert!(req.validate().is_some());
    }
}
