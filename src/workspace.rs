//! Workspace discovery: locating marker directories, listing presentations,
//! and deciding which presentation a command targets.

use crate::error::QuillError;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

/// Upper bound on the upward walk, for filesystems with link cycles.
pub const MAX_LOCATE_DEPTH: usize = 1024;

/// Finds the nearest ancestor of `start` (inclusive) holding a `marker`
/// directory and returns that directory. Falls back to `start/marker`, which
/// may not exist; callers check existence themselves.
pub fn locate(marker: &str, start: &Path) -> PathBuf {
    for dir in start.ancestors().take(MAX_LOCATE_DEPTH) {
        let candidate = dir.join(marker);
        if candidate.is_dir() {
            tracing::debug!(marker, found = %candidate.display(), "located marker directory");
            return candidate;
        }
    }
    let fallback = start.join(marker);
    tracing::debug!(marker, fallback = %fallback.display(), "marker directory not found");
    fallback
}

pub fn is_presentation_dir(dir: &Path, markers: &[String]) -> bool {
    markers.iter().any(|marker| dir.join(marker).exists())
}

/// Lists presentation names under `root`, sorted by name. A missing root
/// yields an empty list.
pub fn find_presentations(root: &Path, markers: &[String]) -> Result<Vec<String>, QuillError> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for entry in fs::read_dir(root)? {
        entries.push(entry?);
    }
    entries.sort_by_key(|entry| entry.file_name());

    let mut names = Vec::new();
    for entry in entries {
        let path = entry.path();
        if !path.is_dir() || !is_presentation_dir(&path, markers) {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => {
                tracing::debug!(name = ?raw, "skipping presentation with non-UTF-8 name");
            }
        }
    }
    Ok(names)
}

/// Interactive single choice. `Ok(None)` means the user made no selection.
pub trait Prompter {
    fn select_one(
        &self,
        prompt: &str,
        candidates: &[String],
    ) -> Result<Option<String>, QuillError>;
}

pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn select_one(
        &self,
        prompt: &str,
        candidates: &[String],
    ) -> Result<Option<String>, QuillError> {
        if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
            tracing::debug!("not attached to a terminal, skipping interactive selection");
            return Ok(None);
        }
        let theme = ColorfulTheme::default();
        let selection = Select::with_theme(&theme)
            .with_prompt(prompt)
            .items(candidates)
            .default(0)
            .interact_opt()?;
        Ok(selection.and_then(|idx| candidates.get(idx).cloned()))
    }
}

fn same_dir(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Where a presentation name comes from, in precedence order.
pub struct ResolveRequest<'a> {
    pub explicit: Option<&'a str>,
    pub cwd: &'a Path,
    pub slides_root: &'a Path,
    pub markers: &'a [String],
    pub prompt: &'a str,
}

pub fn resolve_presentation<P: Prompter + ?Sized>(
    request: &ResolveRequest<'_>,
    prompter: &P,
) -> Result<String, QuillError> {
    if let Some(name) = request.explicit {
        return Ok(name.to_string());
    }

    let cwd_name = request
        .cwd
        .file_name()
        .map(|name| name.to_string_lossy().to_string());
    if let Some(name) = cwd_name {
        if is_presentation_dir(request.cwd, request.markers) {
            tracing::debug!(%name, "working directory is a presentation");
            return Ok(name);
        }
        if request.cwd.parent().map(same_dir) == Some(same_dir(request.slides_root)) {
            tracing::debug!(%name, "working directory is directly under the slides root");
            return Ok(name);
        }
    }

    let presentations = find_presentations(request.slides_root, request.markers)?;
    if presentations.is_empty() {
        return Err(QuillError::NoPresentations {
            root: request.slides_root.to_path_buf(),
        });
    }
    match prompter.select_one(request.prompt, &presentations)? {
        Some(name) => Ok(name),
        None => Err(QuillError::NoSelection),
    }
}
