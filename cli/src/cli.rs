use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::de::DeserializeOwned;
use tracing::{error, info};

use crate::client::{CreateSessionRequest, LlmSettings, SessionClient, PHASE_POLL_TIMEOUT};
use crate::error::CliError;
use crate::output::{write_output, OutputRecord};
use crate::poll::poll_session;

#[derive(Debug, Parser)]
#[command(name = "ambient-session")]
#[command(about = "Create an Ambient Code Platform agentic session")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Base URL of the backend API
    #[arg(long)]
    pub api_url: String,

    /// Bearer token for API authentication
    #[arg(long)]
    pub api_token: String,

    /// Project (namespace) to create the session in
    #[arg(long)]
    pub project: String,

    /// Prompt text for the session
    #[arg(long, default_value = "")]
    pub prompt: String,

    /// Read the prompt from a file (takes precedence over --prompt)
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Human-readable session name
    #[arg(long, default_value = "")]
    pub display_name: String,

    /// Repositories to attach, as a JSON array
    #[arg(long, default_value = "")]
    pub repos: String,

    /// Workflow descriptor, as a JSON object
    #[arg(long, default_value = "")]
    pub workflow: String,

    /// Session labels, as a JSON object of strings
    #[arg(long, default_value = "")]
    pub labels: String,

    /// Environment variables for the session, as a JSON object of strings
    #[arg(long, default_value = "")]
    pub env_vars: String,

    /// Session timeout in minutes
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Model name for the session's LLM settings
    #[arg(long, default_value = "")]
    pub model: String,

    /// Wait for the session to reach a terminal phase
    #[arg(long)]
    pub wait: bool,

    /// Seconds between status polls
    #[arg(long, default_value_t = 15)]
    pub poll_interval: u64,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub no_verify_ssl: bool,

    /// Write the final JSON record to this file
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    pub async fn run(&self) -> Result<(), CliError> {
        let prompt = resolve_prompt(&self.prompt, self.prompt_file.as_deref())?;

        let repos: Option<Vec<serde_json::Value>> = parse_json_flag("--repos", &self.repos)?;
        let workflow: Option<serde_json::Value> = parse_json_flag("--workflow", &self.workflow)?;
        let labels: Option<BTreeMap<String, String>> = parse_json_flag("--labels", &self.labels)?;
        let env_vars: Option<BTreeMap<String, String>> =
            parse_json_flag("--env-vars", &self.env_vars)?;

        let client = SessionClient::new(
            &self.api_url,
            &self.api_token,
            &self.project,
            !self.no_verify_ssl,
        )?;

        let request = CreateSessionRequest {
            initial_prompt: prompt,
            display_name: (!self.display_name.is_empty()).then(|| self.display_name.clone()),
            repos: repos.filter(|r| !r.is_empty()),
            active_workflow: non_empty_json(workflow),
            labels: labels.filter(|m| !m.is_empty()),
            environment_variables: env_vars.filter(|m| !m.is_empty()),
            timeout: (self.timeout > 0).then_some(self.timeout * 60),
            llm_settings: (!self.model.is_empty()).then(|| LlmSettings {
                model: self.model.clone(),
            }),
        };

        let created = match client.create_session(&request).await {
            Ok(created) => created,
            Err(_) => {
                // Already logged by the client. Record the failure for
                // the caller before exiting non-zero.
                write_output(self.output_file.as_deref(), &OutputRecord::create_failed());
                return Err(CliError::CreateFailed);
            }
        };

        let mut record = OutputRecord {
            session_name: created.name.clone(),
            session_uid: created.uid,
            session_phase: String::new(),
            session_result: String::new(),
        };

        if self.wait && !created.name.is_empty() {
            let status =
                poll_session(&client, &created.name, self.poll_interval, self.timeout).await;

            if matches!(status.phase.as_str(), "Error" | "Failed")
                || status.phase == PHASE_POLL_TIMEOUT
            {
                error!("Session ended with phase: {}", status.phase);
            }

            record.session_phase = status.phase;
            record.session_result = status.result;
        } else {
            info!("Fire-and-forget mode, not waiting for completion");
        }

        write_output(self.output_file.as_deref(), &record);
        Ok(())
    }
}

/// Resolve the session prompt. A prompt file takes precedence over the
/// literal flag; a file that cannot be read is fatal.
fn resolve_prompt(prompt: &str, prompt_file: Option<&Path>) -> Result<String, CliError> {
    let prompt = match prompt_file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            CliError::Input(format!(
                "failed to read prompt file {}: {}",
                path.display(),
                e
            ))
        })?,
        None => prompt.to_string(),
    };

    if prompt.is_empty() {
        return Err(CliError::Input(
            "either --prompt or --prompt-file is required".to_string(),
        ));
    }

    Ok(prompt)
}

/// Drop JSON values the backend treats as absent: null, empty objects,
/// empty arrays.
fn non_empty_json(value: Option<serde_json::Value>) -> Option<serde_json::Value> {
    value.filter(|v| match v {
        serde_json::Value::Null => false,
        serde_json::Value::Object(o) => !o.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        _ => true,
    })
}

/// Parse a JSON-valued flag. An empty string means the flag was not
/// given; malformed JSON is a fatal startup error naming the flag.
fn parse_json_flag<T: DeserializeOwned>(flag: &str, raw: &str) -> Result<Option<T>, CliError> {
    if raw.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(raw)
        .map(Some)
        .map_err(|e| CliError::Input(format!("invalid JSON in {}: {}", flag, e)))
}
