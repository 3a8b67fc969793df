//! Error types for the admin service
//!
//! Provides unified error handling using thiserror. Collaborator failures
//! are wrapped without being altered so callers see the original cause.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error ==
/// Failures inside the cache layer itself.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cached value could not be converted to or from its stored form
    #[error("Cache codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

// == Data Error ==
/// Failures reported by the remote data service or its client.
#[derive(Error, Debug)]
pub enum DataError {
    /// Transport-level failure talking to the data service
    #[error("Data service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Data service answered with a non-success status
    #[error("Data service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Stored procedure raised an error
    #[error("RPC {procedure} failed: {message}")]
    Rpc { procedure: String, message: String },

    /// Response body did not have the expected shape
    #[error("Unexpected data service response: {0}")]
    Decode(String),

    /// Table or procedure is unknown to the data service
    #[error("Unknown relation: {0}")]
    UnknownRelation(String),
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Decode(err.to_string())
    }
}

// == License Rejection ==
/// Reasons a license code can be refused on redemption.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseRejection {
    #[error("License code not found")]
    NotFound,
    #[error("License code already used")]
    AlreadyUsed,
    #[error("License code expired")]
    Expired,
}

impl LicenseRejection {
    /// Classifies an RPC error message by the error code it carries.
    pub fn from_message(message: &str) -> Option<Self> {
        if message.contains("LICENSE_NOT_FOUND") {
            Some(LicenseRejection::NotFound)
        } else if message.contains("LICENSE_ALREADY_USED") {
            Some(LicenseRejection::AlreadyUsed)
        } else if message.contains("LICENSE_EXPIRED") {
            Some(LicenseRejection::Expired)
        } else {
            None
        }
    }
}

// == Admin Error Enum ==
/// Unified error type for the admin service and HTTP API.
#[derive(Error, Debug)]
pub enum AdminError {
    /// Reading from the data service failed
    #[error("Fetch failed: {0}")]
    Fetch(#[source] DataError),

    /// Writing to the data service failed
    #[error("Mutation failed: {0}")]
    Mutation(#[source] DataError),

    /// Cache layer failure
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// License redemption refused by the data service
    #[error("{0}")]
    License(LicenseRejection),
}

impl AdminError {
    pub fn fetch(err: DataError) -> Self {
        AdminError::Fetch(err)
    }

    pub fn mutation(err: DataError) -> Self {
        AdminError::Mutation(err)
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdminError::Fetch(_) | AdminError::Mutation(_) => StatusCode::BAD_GATEWAY,
            AdminError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AdminError::License(LicenseRejection::NotFound) => StatusCode::NOT_FOUND,
            AdminError::License(LicenseRejection::AlreadyUsed) => StatusCode::CONFLICT,
            AdminError::License(LicenseRejection::Expired) => StatusCode::GONE,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the admin service.
pub type Result<T> = std::result::Result<T, AdminError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_license_rejection_from_message() {
        assert_eq!(
            LicenseRejection::from_message("P0001: LICENSE_ALREADY_USED"),
            Some(LicenseRejection::AlreadyUsed)
        );
        assert_eq!(
            LicenseRejection::from_message("LICENSE_NOT_FOUND"),
            Some(LicenseRejection::NotFound)
        );
        assert_eq!(
            LicenseRejection::from_message("LICENSE_EXPIRED at 2024-01-01"),
            Some(LicenseRejection::Expired)
        );
        assert_eq!(LicenseRejection::from_message("timeout"), None);
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AdminError::NotFound("user 1".into()), StatusCode::NOT_FOUND),
            (AdminError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
            (
                AdminError::Fetch(DataError::Decode("x".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AdminError::License(LicenseRejection::AlreadyUsed),
                StatusCode::CONFLICT,
            ),
            (AdminError::License(LicenseRejection::Expired), StatusCode::GONE),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_fetch_error_keeps_source_message() {
        let err = AdminError::fetch(DataError::Status {
            status: 503,
            message: "upstream down".into(),
        });
        assert_eq!(
            err.to_string(),
            "Fetch failed: Data service returned 503: upstream down"
        );
    }
}
