use crate::error::{ProcessErrorDetails, QuillError};
use std::collections::BTreeMap;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub const DEFAULT_ID: u32 = 1000;

/// One synchronous invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Variables set on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl ExternalCommand {
    pub fn docker<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: "docker".to_string(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn in_dir(mut self, cwd: &Path) -> Self {
        self.cwd = Some(cwd.to_path_buf());
        self
    }

    pub fn render(&self) -> String {
        fn shell_quote(part: &str) -> String {
            if part.is_empty() {
                return "\"\"".to_string();
            }
            if part.chars().any(|c| c.is_whitespace()) {
                return format!("\"{}\"", part.replace('"', "\\\""));
            }
            part.to_string()
        }
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(shell_quote(&self.program));
        parts.extend(self.args.iter().map(|arg| shell_quote(arg)));
        parts.join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }
}

pub trait Runner {
    fn run(
        &self,
        command: &ExternalCommand,
        capture_output: bool,
    ) -> Result<CommandOutput, io::Error>;
}

pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(
        &self,
        command: &ExternalCommand,
        capture_output: bool,
    ) -> Result<CommandOutput, io::Error> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).envs(&command.env);
        if let Some(cwd) = &command.cwd {
            cmd.current_dir(cwd);
        }
        if capture_output {
            let output = cmd.stdin(Stdio::null()).output()?;
            Ok(CommandOutput {
                status_code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            })
        } else {
            let status = cmd.status()?;
            Ok(CommandOutput {
                status_code: status.code(),
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        }
    }
}

/// Numeric user and group of the invoking user, fixed for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
}

impl Identity {
    pub fn detect() -> Self {
        Self {
            uid: query_id("-u").unwrap_or_else(|| env_id("UID")),
            gid: query_id("-g").unwrap_or_else(|| env_id("GID")),
        }
    }

    pub fn user_spec(&self) -> String {
        format!("{}:{}", self.uid, self.gid)
    }
}

#[cfg(unix)]
fn query_id(flag: &str) -> Option<u32> {
    let output = Command::new("id").arg(flag).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout).trim().parse::<u32>().ok()
}

#[cfg(not(unix))]
fn query_id(_flag: &str) -> Option<u32> {
    None
}

fn env_id(key: &str) -> u32 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(DEFAULT_ID)
}

/// Fresh override map for a child: identity plus, when given, the target
/// presentation. The current process environment is never modified.
pub fn child_env(identity: &Identity, presentation: Option<&str>) -> BTreeMap<String, String> {
    let mut envs = BTreeMap::new();
    envs.insert("UID".to_string(), identity.uid.to_string());
    envs.insert("GID".to_string(), identity.gid.to_string());
    if let Some(name) = presentation {
        envs.insert("PRESENTATION".to_string(), name.to_string());
    }
    envs
}

fn spawn_error_details(err: &io::Error, command: &str) -> ProcessErrorDetails {
    if err.kind() == io::ErrorKind::NotFound {
        return ProcessErrorDetails {
            error_code: "docker_not_found".to_string(),
            hint: Some("Install Docker and ensure `docker` is on your PATH.".to_string()),
            command: Some(command.to_string()),
            raw_stderr: None,
            exit_code: None,
        };
    }
    ProcessErrorDetails {
        error_code: "process_command_failed".to_string(),
        hint: None,
        command: Some(command.to_string()),
        raw_stderr: None,
        exit_code: None,
    }
}

pub fn classify_failure(stderr: &str) -> (String, Option<String>) {
    let lower = stderr.to_lowercase();

    if lower.contains("unknown command: docker compose")
        || lower.contains("is not a docker command")
        || lower.contains("unknown shorthand flag: 'f' in -f")
    {
        return (
            "docker_compose_unavailable".to_string(),
            Some(
                "Docker Compose is unavailable. Install the compose plugin and retry."
                    .to_string(),
            ),
        );
    }

    if lower.contains("cannot connect to the docker daemon")
        || lower.contains("is the docker daemon running")
        || lower.contains("error during connect")
    {
        return (
            "docker_daemon_unreachable".to_string(),
            Some(
                "Docker daemon is unreachable. Start Docker Desktop (or dockerd) and retry."
                    .to_string(),
            ),
        );
    }

    if lower.contains("port is already allocated") || lower.contains("address already in use") {
        return (
            "docker_port_conflict".to_string(),
            Some(
                "A required host port is already in use. Stop the other server and retry."
                    .to_string(),
            ),
        );
    }

    if lower.contains("denied")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        return (
            "docker_registry_auth".to_string(),
            Some("Authenticate with `docker login` if the base image is private.".to_string()),
        );
    }

    ("process_command_failed".to_string(), None)
}

fn relay_to_stderr(bytes: &[u8]) {
    if !bytes.is_empty() {
        eprint!("{}", String::from_utf8_lossy(bytes));
    }
}

/// Runs `command` to completion and turns a nonzero exit into an error that
/// keeps the child's exit code. Never retries.
pub fn execute<R: Runner + ?Sized>(
    runner: &R,
    command: &ExternalCommand,
    capture_output: bool,
) -> Result<CommandOutput, QuillError> {
    let rendered = command.render();
    tracing::debug!(
        command = %rendered,
        cwd = ?command.cwd,
        env = ?command.env,
        "running external command"
    );
    let cmd_output = runner.run(command, capture_output).map_err(|err| {
        let details = spawn_error_details(&err, &rendered);
        QuillError::Process {
            message: format!("failed to run command `{rendered}`: {err}"),
            details,
        }
    })?;
    if cmd_output.success() {
        if capture_output {
            // stdout is reserved for the JSON document
            relay_to_stderr(&cmd_output.stdout);
            relay_to_stderr(&cmd_output.stderr);
        }
        return Ok(cmd_output);
    }
    if capture_output {
        relay_to_stderr(&cmd_output.stdout);
    }

    let stderr = String::from_utf8_lossy(&cmd_output.stderr).trim().to_string();
    let (error_code, hint) = classify_failure(&stderr);
    let status = cmd_output
        .status_code
        .map_or_else(|| "signal".to_string(), |code| code.to_string());
    let mut message = format!("command failed with status {status} while running `{rendered}`");
    if !stderr.is_empty() {
        message = format!("{message}: {stderr}");
    }
    if let Some(ref hint_message) = hint {
        message = format!("{message}\nHint: {hint_message}");
    }
    tracing::debug!(command = %rendered, %status, "external command failed");
    Err(QuillError::Process {
        message,
        details: ProcessErrorDetails {
            error_code,
            hint,
            command: Some(rendered),
            raw_stderr: if stderr.is_empty() { None } else { Some(stderr) },
            exit_code: cmd_output.status_code,
        },
    })
}

/// Runs a read-only check whose exit status is the answer. Only a failure
/// to launch the program is an error.
pub fn probe<R: Runner + ?Sized>(
    runner: &R,
    command: &ExternalCommand,
) -> Result<bool, QuillError> {
    let rendered = command.render();
    let cmd_output = runner.run(command, true).map_err(|err| QuillError::Process {
        message: format!("failed to run command `{rendered}`: {err}"),
        details: spawn_error_details(&err, &rendered),
    })?;
    tracing::debug!(command = %rendered, success = cmd_output.success(), "probe finished");
    Ok(cmd_output.success())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records every command and replays queued exit codes (default 0).
    #[derive(Default)]
    pub(crate) struct MockRunner {
        pub calls: RefCell<Vec<(ExternalCommand, bool)>>,
        pub outputs: RefCell<Vec<CommandOutput>>,
    }

    impl MockRunner {
        pub(crate) fn push_status(&self, status_code: i32, stderr: &str) {
            self.outputs.borrow_mut().push(CommandOutput {
                status_code: Some(status_code),
                stdout: Vec::new(),
                stderr: stderr.as_bytes().to_vec(),
            });
        }

        pub(crate) fn commands(&self) -> Vec<ExternalCommand> {
            self.calls.borrow().iter().map(|(cmd, _)| cmd.clone()).collect()
        }
    }

    impl Runner for MockRunner {
        fn run(
            &self,
            command: &ExternalCommand,
            capture_output: bool,
        ) -> Result<CommandOutput, io::Error> {
            self.calls.borrow_mut().push((command.clone(), capture_output));
            let mut queued = self.outputs.borrow_mut();
            if queued.is_empty() {
                return Ok(CommandOutput {
                    status_code: Some(0),
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                });
            }
            Ok(queued.remove(0))
        }
    }

    struct MissingBinaryRunner;

    impl Runner for MissingBinaryRunner {
        fn run(
            &self,
            _command: &ExternalCommand,
            _capture: bool,
        ) -> Result<CommandOutput, io::Error> {
            Err(io::Error::new(io::ErrorKind::NotFound, "No such file or directory"))
        }
    }

    #[test]
    fn child_env_sets_identity_and_presentation() {
        let identity = Identity { uid: 501, gid: 20 };
        let envs = child_env(&identity, Some("demo"));
        assert_eq!(envs.get("UID").map(String::as_str), Some("501"));
        assert_eq!(envs.get("GID").map(String::as_str), Some("20"));
        assert_eq!(envs.get("PRESENTATION").map(String::as_str), Some("demo"));

        let envs = child_env(&identity, None);
        assert!(!envs.contains_key("PRESENTATION"));
    }

    #[test]
    fn child_env_leaves_process_environment_alone() {
        let before = env::var("PRESENTATION").ok();
        let _ = child_env(&Identity { uid: 1, gid: 2 }, Some("scratch"));
        assert_eq!(env::var("PRESENTATION").ok(), before);
    }

    #[cfg(unix)]
    #[test]
    fn detected_identity_is_stable() {
        assert_eq!(Identity::detect(), Identity::detect());
    }

    #[test]
    fn render_quotes_whitespace() {
        let cmd = ExternalCommand::docker(["run", "sh", "-lc", "npm create slidev"]);
        assert_eq!(cmd.render(), "docker run sh -lc \"npm create slidev\"");
    }

    #[test]
    fn execute_preserves_exit_code_and_stderr() {
        let runner = MockRunner::default();
        runner.push_status(3, "Cannot connect to the Docker daemon at unix:///var/run/docker.sock");
        let err = execute(&runner, &ExternalCommand::docker(["compose", "down"]), true)
            .expect_err("failure");
        assert_eq!(err.exit_code(), 3);
        let details = err.process_details().expect("details");
        assert_eq!(details.error_code, "docker_daemon_unreachable");
        assert_eq!(details.command.as_deref(), Some("docker compose down"));
        assert!(err.to_string().contains("Hint:"));
    }

    #[test]
    fn execute_runs_exactly_once_on_failure() {
        let runner = MockRunner::default();
        runner.push_status(1, "");
        let _ = execute(&runner, &ExternalCommand::docker(["build"]), false);
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[test]
    fn missing_binary_reports_docker_not_found() {
        let err = execute(&MissingBinaryRunner, &ExternalCommand::docker(["info"]), true)
            .expect_err("spawn failure");
        let details = err.process_details().expect("details");
        assert_eq!(details.error_code, "docker_not_found");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn probe_reports_exit_status_without_error() {
        let runner = MockRunner::default();
        runner.push_status(1, "Error: No such image: docs-slidev:latest");
        let inspect = ExternalCommand::docker(["image", "inspect", "docs-slidev:latest"]);
        assert!(!probe(&runner, &inspect).unwrap());
        assert!(probe(&runner, &inspect).unwrap());
        assert!(runner.calls.borrow().iter().all(|(_, captured)| *captured));
    }

    #[test]
    fn classify_recognizes_port_conflict() {
        let (code, hint) =
            classify_failure("Bind for 0.0.0.0:3030 failed: port is already allocated");
        assert_eq!(code, "docker_port_conflict");
        assert!(hint.is_some());
        assert_eq!(
            classify_failure("something else").0,
            "process_command_failed"
        );
    }
}
