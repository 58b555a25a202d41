//! Error types for the runner manager

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse runner config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required request field was missing or malformed
    #[error("{0}")]
    Validation(String),

    /// The external runner tool exited unsuccessfully
    #[error("{message}: {output}")]
    ExternalTool { message: String, output: String },

    #[error("PID file not found for runner: {0}")]
    PidRecordNotFound(String),

    #[error("Runner is already running: {0}")]
    AlreadyRunning(String),

    #[error("Process {0} is not running")]
    ProcessNotRunning(u32),

    #[error("Failed to start runner: {0}")]
    Spawn(String),

    #[error("Failed to signal process: {0}")]
    Signal(String),

    #[error("Runner binary not found: {0}")]
    BinaryNotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// HTTP status line used when this error reaches a client
    pub fn status(&self) -> &'static str {
        match self {
            Error::Validation(_) => "400 Bad Request",
            Error::PidRecordNotFound(_) => "404 Not Found",
            Error::AlreadyRunning(_) => "409 Conflict",
            _ => "500 Internal Server Error",
        }
    }

    /// Raw tool output, if the error came from the external runner tool
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            Error::ExternalTool { output, .. } => Some(output.as_str()),
            _ => None,
        }
    }
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
