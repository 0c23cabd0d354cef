use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info};

/// Request timeout for the session creation POST.
const CREATE_TIMEOUT: Duration = Duration::from_secs(30);
/// Request timeout for a single status GET.
const STATUS_TIMEOUT: Duration = Duration::from_secs(15);

/// Phases after which the remote session will not change state further.
pub const TERMINAL_PHASES: [&str; 5] = ["Completed", "Error", "Timeout", "Stopped", "Failed"];

/// Locally synthesized phase for a failed creation request.
pub const PHASE_CREATE_FAILED: &str = "CreateFailed";
/// Locally synthesized phase for poll deadline exhaustion.
pub const PHASE_POLL_TIMEOUT: &str = "PollTimeout";

pub fn is_terminal(phase: &str) -> bool {
    TERMINAL_PHASES.contains(&phase)
}

/// Body of the session creation request. Optional fields are omitted
/// from the wire entirely when absent, never sent as null.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub initial_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repos: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_workflow: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_variables: Option<BTreeMap<String, String>>,
    /// Session timeout in seconds on the wire; the CLI takes minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_settings: Option<LlmSettings>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmSettings {
    pub model: String,
}

/// Session reference returned by the creation endpoint. Fields the
/// backend leaves out decode as empty strings rather than erroring.
#[derive(Debug, Deserialize)]
pub struct CreatedSession {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uid: String,
}

/// Status block of a session resource.
#[derive(Debug, Default, Deserialize)]
pub struct SessionStatus {
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub result: String,
    #[serde(default, rename = "completionTime")]
    pub completion_time: String,
}

#[derive(Debug, Deserialize)]
struct SessionResource {
    #[serde(default)]
    status: SessionStatus,
}

/// Client for the project-scoped agentic-sessions API.
pub struct SessionClient {
    base_url: String,
    token: String,
    project: String,
    http_client: reqwest::Client,
}

impl SessionClient {
    pub fn new(
        api_url: &str,
        token: &str,
        project: &str,
        verify_ssl: bool,
    ) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .build()?;

        Ok(Self {
            base_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            project: project.to_string(),
            http_client,
        })
    }

    fn sessions_url(&self) -> String {
        format!(
            "{}/projects/{}/agentic-sessions",
            self.base_url, self.project
        )
    }

    /// Create a session. Any transport or HTTP failure is logged here
    /// and surfaced as an error; the driver turns it into the
    /// CreateFailed record.
    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreatedSession, ClientError> {
        let url = self.sessions_url();
        debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .timeout(CREATE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to create session: {}", e);
                ClientError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Failed to create session: HTTP {}: {}", status, body);
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatedSession = response.json().await.map_err(|e| {
            error!("Failed to parse creation response: {}", e);
            ClientError::Network(e)
        })?;

        info!("Session created: name={}, uid={}", created.name, created.uid);
        Ok(created)
    }

    /// Fetch the current status of a session by name.
    pub async fn get_session_status(&self, name: &str) -> Result<SessionStatus, ClientError> {
        let url = format!("{}/{}", self.sessions_url(), name);
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let resource: SessionResource = response.json().await?;
        Ok(resource.status)
    }
}
