//! API Handlers
//!
//! HTTP request handlers for each admin endpoint. Handlers validate input,
//! delegate to the admin service and shape the response.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use crate::error::{AdminError, Result};
use crate::models::{
    AppUsage, AppUser, Application, CacheStatsResponse, DeleteResponse, GenerateLicensesRequest,
    HealthResponse, License, LicenseCodeRequest, LicenseStats, ListQuery, Page, RecordKind,
    RecordQuery, RedeemRequest, RedeemResponse, StatsQuery, UpdateStatusRequest, UserStats,
    UserStatus, VerifyResponse,
};
use crate::service::{AdminService, DateRange};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: AdminService,
}

impl AppState {
    pub fn new(service: AdminService) -> Self {
        Self { service }
    }
}

// == Applications ==
/// Handler for GET /applications
pub async fn applications_handler(State(state): State<AppState>) -> Result<Json<Vec<Application>>> {
    Ok(Json(state.service.applications().await?))
}

/// Handler for GET /usage
pub async fn usage_handler(State(state): State<AppState>) -> Result<Json<Vec<AppUsage>>> {
    Ok(Json(state.service.app_usage().await?))
}

// == Users ==
/// Handler for GET /users
pub async fn list_users_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<AppUser>>> {
    let page = state.service.page(query.limit, query.offset)?;
    let users = state
        .service
        .list_users(query.app.as_deref(), page, query.search.as_deref())
        .await?;
    Ok(Json(users))
}

/// Handler for GET /users/stats
pub async fn user_stats_handler(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<UserStats>> {
    Ok(Json(state.service.user_stats(query.app.as_deref()).await?))
}

/// Handler for PATCH /users/:id/status
pub async fn update_user_status_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<AppUser>> {
    let status: UserStatus = req.status.parse().map_err(AdminError::InvalidRequest)?;
    let user = state.service.update_user_status(&id, status).await?;
    Ok(Json(user))
}

/// Handler for DELETE /users/:id
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.service.delete_user(&id).await?;
    Ok(Json(DeleteResponse::new("User", id)))
}

/// Handler for GET /apps/:app/users/:id/:kind
pub async fn user_records_handler(
    State(state): State<AppState>,
    Path((app, id, kind)): Path<(String, String, RecordKind)>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<Page<Value>>> {
    let page = state.service.page(query.limit, query.offset)?;
    let range = DateRange::new(query.from.as_deref(), query.to.as_deref());
    let records = state
        .service
        .user_records(&app, &id, kind, page, range)
        .await?;
    Ok(Json(records))
}

// == Licenses ==
/// Handler for GET /licenses
pub async fn list_licenses_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<License>>> {
    let page = state.service.page(query.limit, query.offset)?;
    let licenses = state
        .service
        .list_licenses(query.app.as_deref(), page)
        .await?;
    Ok(Json(licenses))
}

/// Handler for GET /licenses/stats
pub async fn license_stats_handler(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<LicenseStats>> {
    Ok(Json(state.service.license_stats(query.app.as_deref()).await?))
}

/// Handler for POST /licenses
pub async fn generate_licenses_handler(
    State(state): State<AppState>,
    Json(req): Json<GenerateLicensesRequest>,
) -> Result<(StatusCode, Json<Vec<License>>)> {
    if let Some(error_msg) = req.validate() {
        return Err(AdminError::InvalidRequest(error_msg));
    }

    let licenses = state
        .service
        .generate_licenses(&req.app_name, req.count)
        .await?;
    Ok((StatusCode::CREATED, Json(licenses)))
}

/// Handler for DELETE /licenses/:id
pub async fn delete_license_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.service.delete_license(&id).await?;
    Ok(Json(DeleteResponse::new("License", id)))
}

/// Handler for POST /licenses/verify
pub async fn verify_license_handler(
    State(state): State<AppState>,
    Json(req): Json<LicenseCodeRequest>,
) -> Result<Json<VerifyResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(AdminError::InvalidRequest(error_msg));
    }

    let valid = state
        .service
        .verify_license(&req.app_name, &req.license_code)
        .await?;
    Ok(Json(VerifyResponse { valid }))
}

/// Handler for POST /licenses/redeem
pub async fn redeem_license_handler(
    State(state): State<AppState>,
    Json(req): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(AdminError::InvalidRequest(error_msg));
    }

    let record = state
        .service
        .redeem_license(
            &req.app_name,
            &req.license_code,
            req.email.as_deref(),
            req.name.as_deref(),
        )
        .await?;
    Ok(Json(RedeemResponse {
        redeemed: true,
        record,
    }))
}

// == Operations ==
/// Handler for GET /cache/stats
pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(state.service.cache().stats().await.into())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
