//! Per-user integration settings.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use callboard_control::{CampaignControl, SettingsUpdate};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::GatewayState;

/// The caller's settings, or `{}` if none were saved.
///
/// # Errors
///
/// Returns an error if the control plane operation fails.
pub async fn get_settings<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
) -> Result<Response, ApiError>
where
    C: CampaignControl + 'static,
{
    let response = match state.control.get_settings(&caller).await? {
        Some(settings) => Json(settings).into_response(),
        None => Json(serde_json::json!({})).into_response(),
    };
    Ok(response)
}

/// Create or update the caller's settings. Absent fields keep their value.
///
/// # Errors
///
/// Returns an error if the control plane operation fails.
pub async fn save_settings<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
    ApiJson(update): ApiJson<SettingsUpdate>,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let settings = state.control.save_settings(&caller, update).await?;
    Ok(Json(settings))
}
