//! HTTP client for the voice agent platform.
//!
//! Used to check an agent's credentials and to discover the variables its prompt
//! expects, which become the agent's dataset schema.
//!
//! ```text
//! VoicePlatform::fetch_agent(key, "agent_abc")
//!     └──▶ GET {api}/v1/convai/agents/agent_abc   (xi-api-key: key)
//!              └──▶ {"name": "...", "prompt": {"variables": ["name", {"name": "city"}]}}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use callboard_store::AgentVariable;
use serde_json::Value;

use crate::error::{ControlError, Result};

/// Default voice platform API root.
pub const DEFAULT_VOICE_API_URL: &str = "https://api.elevenlabs.io";

/// What the voice platform reports about an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceAgentInfo {
    /// Display name on the platform.
    pub name: Option<String>,
    /// Variables the agent's prompt expects.
    pub variables: Vec<AgentVariable>,
}

/// Trait for voice platform lookups.
///
/// This trait abstracts the platform client, allowing for mock implementations
/// in tests.
#[async_trait]
pub trait VoicePlatform: Send + Sync {
    /// Fetch an agent with the caller's own API key.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ConnectionRejected` if the platform refuses the key
    /// or does not know the agent, and `ControlError::Upstream` if it cannot be
    /// reached.
    async fn fetch_agent(&self, api_key: &str, agent_id: &str) -> Result<VoiceAgentInfo>;
}

/// HTTP client for the ElevenLabs conversational AI API.
#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ElevenLabsClient {
    /// Create a client for `base_url` with a 15 second request timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout: Duration::from_secs(15),
        }
    }

    /// Get the API root.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn agent_url(&self, agent_id: &str) -> Result<reqwest::Url> {
        let invalid = || ControlError::Internal(format!("invalid voice API URL: {}", self.base_url));
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(["v1", "convai", "agents", agent_id]);
        Ok(url)
    }
}

#[async_trait]
impl VoicePlatform for ElevenLabsClient {
    async fn fetch_agent(&self, api_key: &str, agent_id: &str) -> Result<VoiceAgentInfo> {
        let response = self
            .client
            .get(self.agent_url(agent_id)?)
            .header("xi-api-key", api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ControlError::Upstream(format!("voice platform request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            tracing::info!(agent_id, status = %status, "Voice platform refused agent lookup");
            return Err(ControlError::ConnectionRejected(format!(
                "voice platform answered {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ControlError::Upstream(format!("invalid voice platform response: {e}")))?;
        Ok(parse_agent(&body))
    }
}

/// Read the name and prompt variables out of an agent document.
///
/// Variables come from `prompt.variables`, else top-level `variables`. Each entry
/// is either a bare name or an object with `name` and an optional `value`.
fn parse_agent(body: &Value) -> VoiceAgentInfo {
    let name = body
        .get("name")
        .or_else(|| body.get("agent_name"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let variables = body
        .pointer("/prompt/variables")
        .or_else(|| body.get("variables"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_variable).collect())
        .unwrap_or_default();

    VoiceAgentInfo { name, variables }
}

fn parse_variable(item: &Value) -> Option<AgentVariable> {
    let (name, value) = match item {
        Value::String(name) => (name.as_str(), None),
        Value::Object(map) => (
            map.get("name")?.as_str()?,
            map.get("value").and_then(Value::as_str).map(str::to_string),
        ),
        _ => return None,
    };
    let name = name.trim();
    (!name.is_empty()).then(|| AgentVariable {
        name: name.to_string(),
        value,
    })
}

/// A voice platform with a fixed set of agents, for tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockVoicePlatform {
    agents: parking_lot::Mutex<std::collections::HashMap<(String, String), VoiceAgentInfo>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockVoicePlatform {
    /// Create a platform that knows no agents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `agent_id` visible to `api_key`.
    pub fn add_agent(&self, api_key: &str, agent_id: &str, info: VoiceAgentInfo) {
        self.agents
            .lock()
            .insert((api_key.to_string(), agent_id.to_string()), info);
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl VoicePlatform for MockVoicePlatform {
    async fn fetch_agent(&self, api_key: &str, agent_id: &str) -> Result<VoiceAgentInfo> {
        self.agents
            .lock()
            .get(&(api_key.to_string(), agent_id.to_string()))
            .cloned()
            .ok_or_else(|| ControlError::ConnectionRejected("voice platform answered 401".into()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn variable(name: &str, value: Option<&str>) -> AgentVariable {
        AgentVariable {
            name: name.to_string(),
            value: value.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn fetch_agent_sends_key_and_reads_prompt_variables() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/convai/agents/agent_abc"))
            .and(header("xi-api-key", "xi-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Sales bot",
                "prompt": {"variables": ["client_name", {"name": "city", "value": "Almaty"}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ElevenLabsClient::new(server.uri());
        let info = client.fetch_agent("xi-secret", "agent_abc").await.unwrap();

        assert_eq!(info.name.as_deref(), Some("Sales bot"));
        assert_eq!(
            info.variables,
            vec![variable("client_name", None), variable("city", Some("Almaty"))]
        );
    }

    #[tokio::test]
    async fn refused_key_is_connection_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/convai/agents/agent_abc"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = ElevenLabsClient::new(server.uri());
        let result = client.fetch_agent("wrong", "agent_abc").await;
        assert!(matches!(result, Err(ControlError::ConnectionRejected(msg)) if msg.contains("401")));
    }

    #[tokio::test]
    async fn garbage_body_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = ElevenLabsClient::new(server.uri());
        let result = client.fetch_agent("key", "agent_abc").await;
        assert!(matches!(result, Err(ControlError::Upstream(_))));
    }

    #[test]
    fn agent_id_is_one_path_segment() {
        let client = ElevenLabsClient::new("http://voice.test/");
        let url = client.agent_url("a/b?c").unwrap();
        assert_eq!(url.path(), "/v1/convai/agents/a%2Fb%3Fc");
    }

    #[test]
    fn parse_agent_falls_back_to_top_level_variables() {
        let info = parse_agent(&json!({
            "agent_name": "Support",
            "variables": [{"name": " order_id "}, {"value": "nameless"}, 7, ""]
        }));
        assert_eq!(info.name.as_deref(), Some("Support"));
        assert_eq!(info.variables, vec![variable("order_id", None)]);
    }

    #[test]
    fn parse_agent_without_variables() {
        let info = parse_agent(&json!({"name": "Plain"}));
        assert!(info.variables.is_empty());
    }

    #[tokio::test]
    async fn mock_platform_rejects_unknown_agents() {
        let mock = MockVoicePlatform::new();
        mock.add_agent("key", "agent_abc", VoiceAgentInfo::default());

        assert!(mock.fetch_agent("key", "agent_abc").await.is_ok());
        assert!(matches!(
            mock.fetch_agent("other", "agent_abc").await,
            Err(ControlError::ConnectionRejected(_))
        ));
    }
}
