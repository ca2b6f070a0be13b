use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuillError {
    #[error("config error: {0}")]
    Config(String),
    #[error("{what} not found at '{}'.", .path.display())]
    Missing { what: String, path: PathBuf },
    #[error("No presentations found in '{}'.\nCreate one with: quill slidev create <name>", .root.display())]
    NoPresentations { root: PathBuf },
    #[error("No presentation selected")]
    NoSelection,
    #[error("Presentation '{name}' not found in '{}'.", .root.display())]
    UnknownPresentation { name: String, root: PathBuf },
    #[error("Directory '{}' already exists. Use a different name.", .path.display())]
    AlreadyExists { path: PathBuf },
    #[error("invalid presentation name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("process error: {message}")]
    Process {
        message: String,
        details: ProcessErrorDetails,
    },
    #[error("Failed to open browser: {0}")]
    Viewer(String),
    #[error("doctor: {0}")]
    Doctor(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProcessErrorDetails {
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl QuillError {
    pub fn missing(what: &str, path: PathBuf) -> Self {
        Self::Missing {
            what: what.to_string(),
            path,
        }
    }

    /// Exit status for the CLI. External failures keep the child's own code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Process { details, .. } => match details.exit_code {
                Some(code) if code > 0 => code,
                _ => 1,
            },
            _ => 1,
        }
    }

    pub fn process_details(&self) -> Option<ProcessErrorDetails> {
        match self {
            Self::Process { details, .. } => Some(details.clone()),
            _ => None,
        }
    }
}
