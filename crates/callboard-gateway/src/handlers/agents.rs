//! Agent endpoints for the caller's own agents.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use callboard_control::{AgentId, AgentPatch, CampaignControl, ConnectionCheck, NewAgent};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::state::GatewayState;

/// List the caller's agents, newest first.
///
/// # Errors
///
/// Returns an error if the control plane operation fails.
pub async fn list_agents<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let agents = state.control.list_agents(&caller).await?;
    Ok(Json(agents))
}

/// Create an agent.
///
/// # Errors
///
/// Returns an error if:
/// - A required field is empty
/// - The caller has reached their agent quota
/// - The control plane operation fails
pub async fn create_agent<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<NewAgent>,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let agent = state.control.create_agent(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

/// Update one of the caller's agents.
///
/// # Errors
///
/// Returns 404 if the agent does not exist or belongs to someone else.
pub async fn update_agent<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
    ApiPath(agent_id): ApiPath<AgentId>,
    ApiJson(patch): ApiJson<AgentPatch>,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let agent = state.control.update_agent(&caller, agent_id, patch).await?;
    Ok(Json(agent))
}

/// Check voice platform credentials and return the agent's variables.
///
/// With `agentId` in the body the variables are also stored on that agent.
///
/// # Errors
///
/// Returns 400 `connection_failed` if the platform refuses the key or agent.
pub async fn check_connection<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
    ApiJson(check): ApiJson<ConnectionCheck>,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let report = state.control.check_connection(&caller, check).await?;
    Ok(Json(report))
}

/// Delete an agent. Only roles that may delete agents get past the check.
///
/// # Errors
///
/// Returns 403 for roles without delete rights.
pub async fn delete_agent<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AuthUser(caller): AuthUser,
    ApiPath(agent_id): ApiPath<AgentId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    state.control.delete_agent(&caller, agent_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
