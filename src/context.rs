use crate::config::Config;
use crate::error::{ProcessErrorDetails, QuillError};
use crate::process::Identity;
use crate::workspace::locate;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub struct JsonResult<T: Serialize> {
    pub ok: bool,
    pub result: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ProcessErrorDetails>,
}

/// Everything one invocation needs, captured once up front.
#[derive(Debug, Clone)]
pub struct Context {
    pub cwd: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
    pub identity: Identity,
    pub slides_dir_override: Option<PathBuf>,
    pub build_dir_override: Option<PathBuf>,
    pub json: bool,
    pub no_browser: bool,
}

impl Context {
    /// Directory holding one subdirectory per presentation. A relative
    /// override is taken against the working directory.
    pub fn slides_root(&self) -> PathBuf {
        match &self.slides_dir_override {
            Some(path) => self.cwd.join(path),
            None => locate(&self.config.paths.slides_marker, &self.cwd),
        }
    }

    /// Directory holding Dockerfiles and compose definitions.
    pub fn build_root(&self) -> PathBuf {
        match &self.build_dir_override {
            Some(path) => self.cwd.join(path),
            None => locate(&self.config.paths.build_marker, &self.cwd),
        }
    }

    /// Child output is captured in JSON mode so stdout stays parseable.
    pub fn capture_output(&self) -> bool {
        self.json
    }

    /// Progress line for humans; silent in JSON mode.
    pub fn note(&self, message: &str) {
        if !self.json {
            println!("{message}");
        }
    }
}

pub fn report(ctx: &Context, message: &str, payload: serde_json::Value) -> Result<(), QuillError> {
    report_with(ctx.json, message, payload)
}

/// JSON mode prints `payload` in the result envelope, otherwise `message`.
pub fn report_with(
    json: bool,
    message: &str,
    payload: serde_json::Value,
) -> Result<(), QuillError> {
    if json {
        let wrapper = JsonResult {
            ok: true,
            result: Some(payload),
            error: None,
            error_details: None,
        };
        print_json(&wrapper)?;
    } else if !message.is_empty() {
        println!("{message}");
    }
    Ok(())
}

pub fn report_error(json: bool, err: &QuillError) -> Result<(), QuillError> {
    if json && matches!(err, QuillError::Doctor(_)) {
        // doctor already printed its envelope with the check list
        return Ok(());
    }
    if json {
        let payload = JsonResult::<serde_json::Value> {
            ok: false,
            result: None,
            error: Some(err.to_string()),
            error_details: err.process_details(),
        };
        print_json(&payload)?;
    } else {
        eprintln!("Error: {err}");
    }
    Ok(())
}

pub fn print_json<T: Serialize>(payload: &T) -> Result<(), QuillError> {
    let text = serde_json::to_string_pretty(payload)?;
    println!("{}", text);
    Ok(())
}
