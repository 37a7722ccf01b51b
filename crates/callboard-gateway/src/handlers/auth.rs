//! Login, logout, and account endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use callboard_auth::TelegramLogin;
use callboard_control::CampaignControl;

use crate::auth::{bearer_token, AuthUser};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::GatewayState;

/// Log in with Telegram Login Widget data.
///
/// Creates the user on first login and returns a session token together with
/// the user.
///
/// # Errors
///
/// Returns 401 if the widget data does not verify or is older than a day.
pub async fn telegram_login<C>(
    State(state): State<Arc<GatewayState<C>>>,
    ApiJson(login): ApiJson<TelegramLogin>,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let outcome = state.control.login(&login).await?;
    Ok(Json(outcome))
}

/// End the current session.
///
/// # Errors
///
/// Returns 401 if the request carries no valid session.
pub async fn logout<C>(
    State(state): State<Arc<GatewayState<C>>>,
    _user: AuthUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    if let Some(token) = bearer_token(&headers) {
        state.control.logout(token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// The current user and the limits of their role.
///
/// # Errors
///
/// Returns 401 without a valid session.
pub async fn me<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let profile = state.control.current_user(&caller).await?;
    Ok(Json(profile))
}

/// Bonus channel membership and whether the bonus can be claimed.
///
/// # Errors
///
/// Returns 503 if membership checks are not configured and 502 if Telegram
/// cannot be reached.
pub async fn channel_status<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let status = state.control.channel_status(&caller).await?;
    Ok(Json(status))
}

/// Claim the one-time channel bonus. Returns the updated user.
///
/// # Errors
///
/// Returns 409 if the bonus was already claimed or the caller is not subscribed.
pub async fn claim_bonus<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let user = state.control.claim_bonus(&caller).await?;
    Ok(Json(user))
}
