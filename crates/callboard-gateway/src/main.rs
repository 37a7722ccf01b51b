//! Callboard Gateway - HTTP API server
//!
//! This is the main entry point for the gateway service. Configuration comes
//! from the environment; see [`GatewayConfig::from_env`].
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` to keep records in memory instead of
//! Airtable. Nothing survives a restart except sessions.
//!
//! # Telegram
//!
//! Without `TELEGRAM_BOT_TOKEN` login data is accepted unverified and the
//! channel bonus cannot be checked. Never run a public deployment that way.

use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use callboard_auth::{
    BotConfig, ChannelMembership, LoginVerifier, MembershipUnavailable, TelegramBotClient,
    TelegramVerifier, UnverifiedLogin,
};
use callboard_control::{CampaignService, ElevenLabsClient};
use callboard_gateway::{create_router, GatewayConfig, GatewayState};
#[cfg(not(feature = "dev-mode"))]
use callboard_store::AirtableClient;
#[cfg(feature = "dev-mode")]
use callboard_store::MemoryRecordStore;
use callboard_store::{Repository, RocksSessionStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,callboard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Callboard Gateway");

    let config = GatewayConfig::from_env()?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        session_dir = %config.session_dir,
        airtable_api_url = %config.airtable_api_url,
        bonus_channel = %config.bonus_channel,
        voice_api_url = %config.voice_api_url,
        telegram_verification = config.telegram_bot_token.is_some(),
        "Gateway configuration loaded"
    );

    // Record store
    #[cfg(feature = "dev-mode")]
    let store = {
        tracing::warn!("DEV MODE ENABLED - records are kept in memory");
        MemoryRecordStore::new()
    };

    #[cfg(not(feature = "dev-mode"))]
    let store = AirtableClient::new(config.airtable()?)?;

    let repo = Arc::new(Repository::new(store));

    // Rebuild virtual IDs in the background; requests are served meanwhile.
    let scan_repo = Arc::clone(&repo);
    tokio::spawn(async move {
        let loaded = scan_repo.load_identities().await;
        tracing::info!(tables = loaded, "Identity scan finished");
    });

    // Session store
    tracing::info!(path = %config.session_dir, "Opening session store");
    let sessions = Arc::new(RocksSessionStore::open(&config.session_dir)?);

    // Telegram
    let (verifier, membership): (Arc<dyn LoginVerifier>, Arc<dyn ChannelMembership>) =
        if let Some(token) = &config.telegram_bot_token {
            let control_config = config.control();
            let verifier =
                TelegramVerifier::new(token).with_max_age(control_config.login_max_age_seconds);
            let client = TelegramBotClient::new(BotConfig::new(token, &config.bonus_channel))?;
            (Arc::new(verifier), Arc::new(client))
        } else {
            tracing::warn!("TELEGRAM_BOT_TOKEN is not set - logins are NOT verified");
            tracing::warn!("Channel membership checks are unavailable");
            (Arc::new(UnverifiedLogin), Arc::new(MembershipUnavailable))
        };

    let control = Arc::new(CampaignService::new(
        repo,
        sessions,
        verifier,
        membership,
        Arc::new(ElevenLabsClient::new(&config.voice_api_url)),
        config.control(),
    ));
    control.gate().purge_expired(Utc::now())?;
    tracing::info!("Control plane initialized");

    let listen_addr = config.listen_addr.clone();
    let state = GatewayState::new(control, config);
    let app = create_router(state);

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
