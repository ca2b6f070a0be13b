use crate::error::QuillError;
use std::path::PathBuf;
use std::process::{Command, Stdio};

pub fn local_url(port: u16) -> String {
    format!("http://localhost:{port}/")
}

const NO_ARGS: &[&str] = &[];
const WINDOWS_START_ARGS: &[&str] = &["/C", "start", ""];

fn opener_for_os(os: &str) -> (&'static str, &'static [&'static str]) {
    match os {
        "macos" => ("open", NO_ARGS),
        "windows" => ("cmd", WINDOWS_START_ARGS),
        _ => ("xdg-open", NO_ARGS),
    }
}

fn find_opener() -> Result<(PathBuf, &'static [&'static str]), QuillError> {
    let (program, prefix) = opener_for_os(std::env::consts::OS);
    let path = which::which(program)
        .map_err(|err| QuillError::Viewer(format!("`{program}` is not available: {err}")))?;
    Ok((path, prefix))
}

/// Hands `url` to the desktop's default browser without waiting for it.
pub fn open_url(url: &str) -> Result<(), QuillError> {
    let (opener, prefix) = find_opener()?;
    tracing::debug!(opener = %opener.display(), url, "opening browser");
    Command::new(&opener)
        .args(prefix)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| QuillError::Viewer(format!("{}: {err}", opener.display())))?;
    Ok(())
}

/// Like [`open_url`], but failures are only logged.
pub fn open_url_best_effort(url: &str) {
    if let Err(err) = open_url(url) {
        tracing::info!(url, error = %err, "could not open browser");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_url_uses_port() {
        assert_eq!(local_url(3030), "http://localhost:3030/");
    }

    #[test]
    fn opener_per_platform() {
        assert_eq!(opener_for_os("macos").0, "open");
        assert_eq!(opener_for_os("linux").0, "xdg-open");
        assert_eq!(opener_for_os("windows").1, &["/C", "start", ""]);
    }
}
