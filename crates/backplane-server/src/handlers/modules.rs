//! Module CRUD and search endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use backplane_api::{ApiError, ModuleSearchParams, PageParams, PageResponse, UpdateModuleRequest};
use backplane_core::error::CoreError;
use backplane_core::module::{Module, ModuleDraft, ModulePatch};
use backplane_storage::ModuleFilter;
use uuid::Uuid;

use crate::state::AppState;

pub async fn create_module(
    State(state): State<AppState>,
    Json(draft): Json<ModuleDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let module = state.modules.create(draft).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

pub async fn get_module(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Module>, ApiError> {
    let module = state
        .modules
        .find_by_id(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Module", id.to_string()))?;
    Ok(Json(module))
}

pub async fn list_modules(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<Module>>, ApiError> {
    let pagination = &state.config.pagination;
    let request = params.into_page_request(pagination.default_size, pagination.max_size)?;
    let page = state.modules.find_page(&request).await?;
    Ok(Json(PageResponse::from(page)))
}

pub async fn update_module(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateModuleRequest>,
) -> Result<Json<Module>, ApiError> {
    let updated = state.modules.update(request.into_module(id)).await?;
    Ok(Json(updated))
}

pub async fn patch_module(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ModulePatch>,
) -> Result<Json<Module>, ApiError> {
    let updated = state.modules.partial_update(id, patch).await?;
    Ok(Json(updated))
}

pub async fn delete_module(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.modules.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Filtered search. `code` matches the access level exactly; `name`
/// matches case-insensitively on a fragment.
pub async fn search_modules(
    State(state): State<AppState>,
    Query(params): Query<ModuleSearchParams>,
) -> Result<Json<PageResponse<Module>>, ApiError> {
    let mut filter = ModuleFilter::new();
    if let Some(name) = params.name {
        filter = filter.with_name(name);
    }
    if let Some(code) = params.code {
        filter = filter.with_access_level(code);
    }

    let pagination = &state.config.pagination;
    let request = PageParams {
        page: params.page,
        size: params.size,
        sort: None,
        direction: None,
    }
    .into_page_request(pagination.default_size, pagination.max_size)?;

    let page = state.modules.search(&filter, &request).await?;
    Ok(Json(PageResponse::from(page)))
}
