use crate::error::QuillError;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_YAML: &str = include_str!("../config/default.yaml");
const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub version: u32,
    pub project: Project,
    pub paths: Paths,
    pub slidev: Slidev,
    pub mkdocs: Mkdocs,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Project {
    pub slug: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Paths {
    pub slides_marker: String,
    pub build_marker: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Slidev {
    pub image: String,
    pub dockerfile: String,
    pub compose_file: String,
    pub service: String,
    pub export_service: String,
    pub port: u16,
    pub export_file: String,
    pub markers: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Mkdocs {
    pub compose_file: String,
    pub serve_service: String,
    pub build_service: String,
    pub port: u16,
    pub site_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            project: Project::default(),
            paths: Paths::default(),
            slidev: Slidev::default(),
            mkdocs: Mkdocs::default(),
        }
    }
}

impl Default for Project {
    fn default() -> Self {
        Self {
            slug: "docs".to_string(),
        }
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            slides_marker: "slides".to_string(),
            build_marker: ".build".to_string(),
        }
    }
}

impl Default for Slidev {
    fn default() -> Self {
        Self {
            image: "".to_string(),
            dockerfile: "slidev.Dockerfile".to_string(),
            compose_file: "slidev-compose.yml".to_string(),
            service: "slidev".to_string(),
            export_service: "slidev-export".to_string(),
            port: 3030,
            export_file: "slides-export.pdf".to_string(),
            markers: vec!["package.json".to_string(), "slides.md".to_string()],
        }
    }
}

impl Default for Mkdocs {
    fn default() -> Self {
        Self {
            compose_file: "mkdocs-compose.yml".to_string(),
            serve_service: "mkdocs-serve".to_string(),
            build_service: "mkdocs-build".to_string(),
            port: 8000,
            site_dir: "mkdocs/site".to_string(),
        }
    }
}

impl Config {
    /// Image tag used by `slidev build`, `create` and the image probe.
    pub fn slidev_image(&self) -> String {
        let image = self.slidev.image.trim();
        if image.is_empty() {
            format!("{}-slidev:latest", self.project.slug)
        } else {
            image.to_string()
        }
    }
}

pub fn resolve_config_path(override_path: Option<&PathBuf>) -> PathBuf {
    if let Some(path) = override_path {
        return path.clone();
    }
    if let Ok(path) = env::var("QUILL_CONFIG") {
        return PathBuf::from(path);
    }
    let mut base = default_config_dir();
    base.push("config.yaml");
    base
}

pub fn default_config_dir() -> PathBuf {
    if let Ok(path) = env::var("QUILL_CONFIG_DIR") {
        return PathBuf::from(path);
    }
    let mut base = home_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push(".config");
    base.push("quill");
    base
}

pub fn read_config_from_str(content: &str) -> Result<Config, QuillError> {
    let cfg: Config = serde_yaml::from_str(content)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn read_config(path: &Path) -> Result<Config, QuillError> {
    let content = fs::read_to_string(path)?;
    read_config_from_str(&content)
}

/// Loads the config file, or the built-in defaults when there is none.
pub fn load_config(path: &Path) -> Result<Config, QuillError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    read_config(path).map_err(|err| {
        QuillError::Config(format!(
            "config is invalid. Please edit {} and try again. ({})",
            path.display(),
            err
        ))
    })
}

fn validate_config(cfg: &Config) -> Result<(), QuillError> {
    if cfg.version != CONFIG_VERSION {
        return Err(QuillError::Config(format!(
            "unsupported config version {}",
            cfg.version
        )));
    }
    if cfg.project.slug.trim().is_empty() {
        return Err(QuillError::Config("project.slug must not be empty".to_string()));
    }
    for (field, value) in [
        ("paths.slides_marker", &cfg.paths.slides_marker),
        ("paths.build_marker", &cfg.paths.build_marker),
    ] {
        if value.trim().is_empty() || value.contains('/') || value.contains('\\') {
            return Err(QuillError::Config(format!(
                "{field} must be a single directory name"
            )));
        }
    }
    if cfg.slidev.markers.is_empty() {
        return Err(QuillError::Config(
            "slidev.markers must list at least one file name".to_string(),
        ));
    }
    Ok(())
}

pub fn ensure_parent(path: &Path) -> Result<(), QuillError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn embedded_default_matches_struct_defaults() {
        let cfg = read_config_from_str(DEFAULT_CONFIG_YAML).expect("default config");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn config_unknown_field_errors() {
        let yaml = r#"
version: 1
unknown: true
"#;
        let result: Result<Config, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn config_defaults_apply() {
        let cfg = read_config_from_str("version: 1\nproject:\n  slug: talks\n").expect("config");
        assert_eq!(cfg.paths.slides_marker, "slides");
        assert_eq!(cfg.slidev.port, 3030);
        assert_eq!(cfg.slidev_image(), "talks-slidev:latest");
    }

    #[test]
    fn explicit_image_wins_over_slug() {
        let cfg = read_config_from_str("version: 1\nslidev:\n  image: custom/slidev:2\n")
            .expect("config");
        assert_eq!(cfg.slidev_image(), "custom/slidev:2");
    }

    #[test]
    fn unsupported_version_rejected() {
        let err = read_config_from_str("version: 3").expect_err("version 3");
        assert!(err.to_string().contains("unsupported config version 3"));
    }

    #[test]
    fn marker_with_separator_rejected() {
        let err = read_config_from_str("version: 1\npaths:\n  build_marker: a/b\n")
            .expect_err("nested marker");
        assert!(err.to_string().contains("paths.build_marker"));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.yaml")).expect("defaults");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn invalid_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 1\nbogus: 1\n").unwrap();
        let err = load_config(&path).expect_err("invalid config");
        let message = err.to_string();
        assert!(message.contains("config is invalid"));
        assert!(message.contains(&path.display().to_string()));
    }
}
