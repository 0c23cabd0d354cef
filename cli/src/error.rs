use thiserror::Error;

/// Main error type for the ambient-session CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid command-line input (missing prompt, unreadable prompt
    /// file, malformed JSON flag)
    #[error("Invalid input: {0}")]
    Input(String),
    /// Logging or configuration setup errors
    #[error("Configuration error: {0}")]
    Config(String),
    /// Session creation failed; the CreateFailed record was already written
    #[error("Session creation failed")]
    CreateFailed,
    /// Errors from the session API client
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl CliError {
    /// Get the exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Errors from talking to the backend API
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
}
