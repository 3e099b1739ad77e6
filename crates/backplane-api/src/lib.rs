//! HTTP-facing types for the backplane server: the API error taxonomy
//! with status mapping, request/response DTOs, query parameter shapes,
//! and the page envelope.
//!
//! Handlers live in `backplane-server`; this crate only defines the
//! wire types they exchange so they can be asserted on from tests
//! without a running server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use backplane_auth::types::User;
use backplane_core::{CoreError, Module, Operation};
use backplane_storage::{Page, PageRequest, SortDirection};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// -------------------------
// Error taxonomy
// -------------------------

/// High-level API errors mapped to HTTP responses.
///
/// Domain errors arrive via `From<CoreError>`; auth errors carry their
/// own `IntoResponse` in `backplane-auth` and never pass through here.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Division by zero: {0}")]
    DivisionByZero(String),
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Duplicate name: {0}")]
    DuplicateName(String),
    #[error("Version conflict: {0}")]
    VersionConflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code carried in the error body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "validation",
            ApiError::DivisionByZero(_) => "division_by_zero",
            ApiError::UnsupportedOperation(_) => "unsupported_operation",
            ApiError::NotFound(_) => "not_found",
            ApiError::DuplicateName(_) => "duplicate_name",
            ApiError::VersionConflict(_) => "version_conflict",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_)
            | ApiError::DivisionByZero(_)
            | ApiError::UnsupportedOperation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DuplicateName(_) | ApiError::VersionConflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::Validation { .. } => ApiError::BadRequest(err.to_string()),
            CoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            CoreError::VersionConflict { .. } => ApiError::VersionConflict(err.to_string()),
            CoreError::DuplicateName { .. } => ApiError::DuplicateName(err.to_string()),
            CoreError::DivisionByZero => ApiError::DivisionByZero(err.to_string()),
            CoreError::UnsupportedOperation(_) => ApiError::UnsupportedOperation(err.to_string()),
            CoreError::JsonError(_) | CoreError::Storage(_) => ApiError::Internal(err.to_string()),
        }
    }
}

/// JSON error body: `{"error": <code>, "message": <human text>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Storage internals never leak verbatim.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "internal error reached the API boundary");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorBody {
            error: self.code().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

// -------------------------
// Page envelope
// -------------------------

/// Page envelope returned by every paged endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub content: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> From<Page<T>> for PageResponse<T> {
    fn from(page: Page<T>) -> Self {
        let total_pages = page.total_pages();
        Self {
            content: page.items,
            page: page.page,
            size: page.size,
            total_elements: page.total,
            total_pages,
        }
    }
}

// -------------------------
// Query parameters
// -------------------------

/// Pagination query parameters shared by the list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
    pub size: Option<usize>,
    pub sort: Option<String>,
    pub direction: Option<String>,
}

impl PageParams {
    /// Builds a store-level page request, applying the configured
    /// default and clamping oversized requests to `max_size`.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a zero page size or an unknown sort
    /// direction.
    pub fn into_page_request(
        self,
        default_size: usize,
        max_size: usize,
    ) -> Result<PageRequest, ApiError> {
        let size = self.size.unwrap_or(default_size);
        if size == 0 {
            return Err(ApiError::bad_request("page size must be at least 1"));
        }
        let direction = match self.direction.as_deref() {
            None => SortDirection::Asc,
            Some(raw) => SortDirection::parse(raw).ok_or_else(|| {
                ApiError::bad_request(format!(
                    "unknown sort direction '{raw}', expected asc or desc"
                ))
            })?,
        };
        let mut request = PageRequest::new()
            .with_page(self.page.unwrap_or(0))
            .with_size(size.min(max_size))
            .with_direction(direction);
        if let Some(sort) = self.sort {
            request = request.with_sort(sort);
        }
        Ok(request)
    }
}

/// Query parameters for the module search endpoint. `code` filters on
/// the access level tag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleSearchParams {
    pub name: Option<String>,
    pub code: Option<String>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

/// Query parameters for the calculator history endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryParams {
    pub operation: Option<String>,
    pub min_result: Option<f64>,
    pub max_result: Option<f64>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

// -------------------------
// Module DTOs
// -------------------------

/// Body of a full module update. Carries the version the caller read;
/// a stale one is rejected with a conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateModuleRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub system: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_level: Option<String>,
    pub version: i64,
}

impl UpdateModuleRequest {
    /// Assembles the module row for the store. The store preserves the
    /// stored `created_at` and restamps `last_modified_at` itself.
    pub fn into_module(self, id: Uuid) -> Module {
        let now = OffsetDateTime::now_utc();
        Module {
            id,
            name: self.name,
            description: self.description,
            active: self.active,
            system: self.system,
            access_level: self.access_level,
            created_at: now,
            last_modified_at: now,
            version: self.version,
        }
    }
}

// -------------------------
// Calculator DTOs
// -------------------------

/// Body of a compute request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalculationRequest {
    pub operand1: f64,
    pub operand2: f64,
}

/// Body of a compute response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalculationResponse {
    pub operand1: f64,
    pub operand2: f64,
    pub operation: Operation,
    pub result: f64,
}

// -------------------------
// User DTOs
// -------------------------

/// Projection of the authenticated principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            roles: user.roles,
        }
    }
}
