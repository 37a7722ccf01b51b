//! Call log endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use axum::response::IntoResponse;
use axum::Json;

use callboard_control::CampaignControl;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Calls across all of the caller's batches, newest first.
///
/// Statuses change while a campaign runs, so the response is marked uncacheable.
///
/// # Errors
///
/// Returns an error if the control plane operation fails.
pub async fn list_calls<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let calls = state.control.list_calls(&caller).await?;
    let no_store = [
        (CACHE_CONTROL, "no-store, no-cache, must-revalidate, private"),
        (PRAGMA, "no-cache"),
        (EXPIRES, "0"),
    ];
    Ok((no_store, Json(calls)))
}
