// Handlers for the JSON API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use axum_extra::extract::Query;

use crate::{
    auth_middleware::AuthenticatedUser,
    error::AppError,
    filters::{FilterParams, FilterState},
    query,
    AppState,
};

// GET /api/vehicles?price_min=..&brand=..&feature=..&feature=..
pub async fn list_vehicles(
    State(app_state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Response, AppError> {
    let filters = FilterState::from(params);
    tracing::info!("[HANDLER] /api/vehicles - filters: {:?}", filters);

    let result = query::execute(app_state.backend.as_ref(), &filters).await;
    if result.error.is_some() {
        // Same body shape, so clients can render the error state directly
        return Ok((StatusCode::BAD_GATEWAY, Json(result)).into_response());
    }
    tracing::info!("[HANDLER] /api/vehicles - returning {} of {}", result.vehicles.len(), result.total_count);
    Ok(Json(result).into_response())
}

pub async fn get_vehicle(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("[HANDLER] /api/vehicles/{} - Request received", id);
    let vehicle = app_state
        .backend
        .get_vehicle(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Vehicle {} not found", id)))?;
    Ok(Json(vehicle))
}

pub async fn list_brands(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let brands = app_state.backend.list_brands().await?;
    tracing::info!("[HANDLER] /api/brands - {} brands", brands.len());
    Ok(Json(brands))
}

pub async fn list_models(
    State(app_state): State<AppState>,
    Path(brand_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let models = app_state.backend.list_models(&brand_id).await?;
    tracing::info!("[HANDLER] /api/brands/{}/models - {} models", brand_id, models.len());
    Ok(Json(models))
}

pub async fn list_features(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let features = app_state.backend.list_features().await?;
    tracing::info!("[HANDLER] /api/features - {} features", features.len());
    Ok(Json(features))
}

pub async fn current_user(auth: AuthenticatedUser) -> Result<impl IntoResponse, AppError> {
    tracing::info!("[HANDLER] /api/me - user {}", auth.user.id);
    Ok(Json(auth.user))
}
