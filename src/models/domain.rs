//! Domain records returned by the admin service.
//!
//! Rows coming back from the data service are normalized into these shapes.
//! They round-trip through serde because the cache stores them as JSON.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

// == Applications ==
/// A downstream application (tenant) managed by the console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Application {
    /// Falls back to the technical name when no display name is set.
    pub fn normalized(mut self) -> Self {
        if self.display_name.trim().is_empty() {
            self.display_name = self.name.clone();
        }
        self
    }
}

// == Users ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            other => Err(format!(
                "Unknown status '{}', expected active, inactive or suspended",
                other
            )),
        }
    }
}

/// A user registered in one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppUser {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub app_name: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub status: UserStatus,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub license_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// == User Records ==
/// Kinds of per-user rows an application keeps in its own tables.
///
/// Their shape is owned by the application, so rows are passed through as
/// JSON rather than decoded into a fixed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Transactions,
    Budgets,
    Goals,
    Categories,
    Tasks,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Transactions => "transactions",
            RecordKind::Budgets => "budgets",
            RecordKind::Goals => "goals",
            RecordKind::Categories => "categories",
            RecordKind::Tasks => "tasks",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Licenses ==
/// A license code issued for one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub license_code: String,
    pub app_name: String,
    #[serde(default)]
    pub is_used: bool,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub used_by: Option<String>,
    #[serde(default)]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// == Statistics ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LicenseStats {
    pub total: u64,
    pub used: u64,
    pub available: u64,
}

/// User and license figures for one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppUsage {
    pub app_name: String,
    pub display_name: String,
    pub users: UserStats,
    pub licenses: LicenseStats,
}

// == Pagination ==
/// One window of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub limit: u32,
    pub offset: u32,
}

fn default_true() -> bool {
    true
}

// Ids arrive as integers or strings depending on the table.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("invalid id: {}", other))),
    }
}

fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!("invalid id: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_from_row_with_numeric_ids() {
        let row = json!({
            "id": 42,
            "app_name": "cashflow",
            "email": "a@b.c",
            "status": "suspended",
            "license_id": 7,
            "created_at": "2024-05-01T10:00:00+00:00",
        });
        let user: AppUser = serde_json::from_value(row).unwrap();
        assert_eq!(user.id, "42");
        assert_eq!(user.license_id.as_deref(), Some("7"));
        assert_eq!(user.status, UserStatus::Suspended);
        assert!(user.name.is_none());
        assert!(user.created_at.is_some());

        // Cached form decodes back to the same record
        let cached = serde_json::to_value(&user).unwrap();
        assert_eq!(serde_json::from_value::<AppUser>(cached).unwrap(), user);
    }

    #[test]
    fn test_license_null_fields() {
        let row = json!({
            "id": "b3a1",
            "license_code": "ABCD-EFGH-IJKL-MNOP",
            "app_name": "productivity",
            "is_used": false,
            "used_by": null,
            "used_at": null,
        });
        let license: License = serde_json::from_value(row).unwrap();
        assert_eq!(license.id, "b3a1");
        assert!(license.used_by.is_none());
        assert!(license.used_at.is_none());
    }

    #[test]
    fn test_application_display_name_fallback() {
        let row = json!({"id": 1, "name": "legacy"});
        let app: Application = serde_json::from_value(row).unwrap();
        let app = app.normalized();
        assert_eq!(app.display_name, "legacy");
        assert!(app.is_active);
    }

    #[test]
    fn test_user_status_parse() {
        assert_eq!("Active".parse::<UserStatus>(), Ok(UserStatus::Active));
        assert_eq!(" suspended ".parse::<UserStatus>(), Ok(UserStatus::Suspended));
        assert!("banned".parse::<UserStatus>().is_err());
    }
}
