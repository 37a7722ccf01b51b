//! Batch (call campaign) endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use callboard_control::{BatchId, CampaignControl, DatasetCheck, NewBatch};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::state::GatewayState;

/// List the caller's batches, newest first.
///
/// # Errors
///
/// Returns an error if the control plane operation fails.
pub async fn list_batches<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let batches = state.control.list_batches(&caller).await?;
    Ok(Json(batches))
}

/// Create a pending batch from an inline dataset.
///
/// # Errors
///
/// Returns an error if:
/// - The agent does not exist or belongs to someone else (404)
/// - The dataset is malformed or misses the agent's variables (400)
/// - The dataset exceeds the caller's batch size (403)
pub async fn create_batch<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<NewBatch>,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let batch = state.control.create_batch(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// Check a dataset before upload. Over-limit datasets are reported, not rejected.
///
/// # Errors
///
/// Returns 400 if the dataset is malformed or misses the agent's variables.
pub async fn validate_dataset<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<DatasetCheck>,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let report = state.control.validate_dataset(&caller, body).await?;
    Ok(Json(report))
}

/// One batch with its calls.
///
/// # Errors
///
/// Returns 404 if the batch does not exist or belongs to someone else.
pub async fn get_batch<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
    ApiPath(batch_id): ApiPath<BatchId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let detail = state.control.get_batch(&caller, batch_id).await?;
    Ok(Json(detail))
}
