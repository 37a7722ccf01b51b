//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use callboard_control::CampaignControl;

use crate::handlers::{admin, agents, auth, batches, calls, health, settings};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `POST /api/auth/telegram` - Log in with Telegram widget data
///
/// ## Account (authenticated)
/// - `POST /api/auth/logout` - End the session
/// - `GET /api/auth/me` - Current user and limits
/// - `GET /api/auth/channel` - Bonus channel membership
/// - `POST /api/auth/bonus` - Claim the channel bonus
///
/// ## Campaigns (authenticated)
/// - `GET /api/agents` - List own agents
/// - `POST /api/agents` - Create agent
/// - `POST /api/agents/check-connection` - Check voice platform credentials
/// - `PUT /api/agents/:id` - Update own agent
/// - `DELETE /api/agents/:id` - Delete agent (admin role)
/// - `GET /api/batches` - List own batches
/// - `POST /api/batches` - Create batch
/// - `POST /api/batches/validate` - Advisory dataset check
/// - `GET /api/batches/:id` - Batch with its calls
/// - `GET /api/calls` - Calls across own batches
/// - `GET /api/settings` - Own settings
/// - `POST /api/settings` - Save own settings
///
/// ## Administration (admin role)
/// - `GET /api/admin/users` - All users
/// - `PATCH /api/admin/users/:id/role` - Change a user's role
/// - `GET /api/admin/users/:id/agents` - A user's agents
/// - `PUT /api/admin/agents/:id` - Update any agent
/// - `DELETE /api/admin/agents/:id` - Delete any agent
pub fn create_router<C>(state: GatewayState<C>) -> Router
where
    C: CampaignControl + 'static,
{
    // Extract config values before moving state
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // Account
        .route("/api/auth/telegram", post(auth::telegram_login::<C>))
        .route("/api/auth/logout", post(auth::logout::<C>))
        .route("/api/auth/me", get(auth::me::<C>))
        .route("/api/auth/channel", get(auth::channel_status::<C>))
        .route("/api/auth/bonus", post(auth::claim_bonus::<C>))
        // Agents
        .route(
            "/api/agents",
            get(agents::list_agents::<C>).post(agents::create_agent::<C>),
        )
        .route(
            "/api/agents/check-connection",
            post(agents::check_connection::<C>),
        )
        .route(
            "/api/agents/:id",
            put(agents::update_agent::<C>).delete(agents::delete_agent::<C>),
        )
        // Batches and calls
        .route(
            "/api/batches",
            get(batches::list_batches::<C>).post(batches::create_batch::<C>),
        )
        .route(
            "/api/batches/validate",
            post(batches::validate_dataset::<C>),
        )
        .route("/api/batches/:id", get(batches::get_batch::<C>))
        .route("/api/calls", get(calls::list_calls::<C>))
        // Settings
        .route(
            "/api/settings",
            get(settings::get_settings::<C>).post(settings::save_settings::<C>),
        )
        // Administration
        .route("/api/admin/users", get(admin::list_users::<C>))
        .route("/api/admin/users/:id/role", patch(admin::set_user_role::<C>))
        .route(
            "/api/admin/users/:id/agents",
            get(admin::list_user_agents::<C>),
        )
        .route(
            "/api/admin/agents/:id",
            put(admin::update_agent::<C>).delete(admin::delete_agent::<C>),
        )
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(request_timeout))
                .layer(DefaultBodyLimit::max(max_body_bytes))
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_any_origin() {
        let origins = vec!["*".to_string()];
        let _layer = build_cors_layer(&origins);
    }

    #[test]
    fn cors_specific_origins() {
        let origins = vec![
            "http://localhost:5173".to_string(),
            "not a header value\n".to_string(),
        ];
        let _layer = build_cors_layer(&origins);
    }
}
