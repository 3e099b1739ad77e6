//! Calculator endpoints.
//!
//! Each compute endpoint evaluates the operation, logs the result as a
//! history record and returns both operands with the outcome. A failed
//! computation is rejected before anything is persisted.

use axum::Json;
use axum::extract::{Query, State};
use backplane_api::{ApiError, CalculationRequest, CalculationResponse, HistoryParams, PageParams, PageResponse};
use backplane_core::calculation::{CalculationDraft, CalculationRecord, Operation};
use backplane_storage::CalculationFilter;

use crate::state::AppState;

/// History pages are deliberately smaller than entity listings.
const HISTORY_DEFAULT_PAGE_SIZE: usize = 10;

pub async fn add(
    state: State<AppState>,
    request: Json<CalculationRequest>,
) -> Result<Json<CalculationResponse>, ApiError> {
    compute_and_log(state, Operation::Add, request).await
}

pub async fn subtract(
    state: State<AppState>,
    request: Json<CalculationRequest>,
) -> Result<Json<CalculationResponse>, ApiError> {
    compute_and_log(state, Operation::Subtract, request).await
}

pub async fn multiply(
    state: State<AppState>,
    request: Json<CalculationRequest>,
) -> Result<Json<CalculationResponse>, ApiError> {
    compute_and_log(state, Operation::Multiply, request).await
}

pub async fn divide(
    state: State<AppState>,
    request: Json<CalculationRequest>,
) -> Result<Json<CalculationResponse>, ApiError> {
    compute_and_log(state, Operation::Divide, request).await
}

async fn compute_and_log(
    State(state): State<AppState>,
    operation: Operation,
    Json(request): Json<CalculationRequest>,
) -> Result<Json<CalculationResponse>, ApiError> {
    let result = operation.apply(request.operand1, request.operand2)?;
    state
        .calculator
        .log_calculation(CalculationDraft::new(
            request.operand1,
            request.operand2,
            operation,
        ))
        .await?;

    Ok(Json(CalculationResponse {
        operand1: request.operand1,
        operand2: request.operand2,
        operation,
        result,
    }))
}

pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<PageResponse<CalculationRecord>>, ApiError> {
    let mut filter = CalculationFilter::new();
    if let Some(raw) = params.operation.as_deref() {
        filter = filter.with_operation(Operation::parse(raw)?);
    }
    if let Some(min) = params.min_result {
        filter = filter.with_min_result(min);
    }
    if let Some(max) = params.max_result {
        filter = filter.with_max_result(max);
    }

    let request = PageParams {
        page: params.page,
        size: params.size,
        sort: None,
        direction: None,
    }
    .into_page_request(HISTORY_DEFAULT_PAGE_SIZE, state.config.pagination.max_size)?;

    let page = state.calculator.history(&filter, &request).await?;
    Ok(Json(PageResponse::from(page)))
}
