use crate::error::{Error, Result};
use crate::paths;
use crate::unicorn::UnicornConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A deployable application: where it runs and how its Unicorn is configured.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Project {
    #[serde(skip)]
    pub id: String,

    /// Checkout on the deploying machine, used to find the local Unicorn config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,

    #[serde(default)]
    pub hosts: Vec<Host>,

    #[serde(flatten)]
    pub unicorn: UnicornConfig,

    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Host {
    pub host: String,
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
    #[serde(default = "default_roles")]
    pub roles: Vec<String>,
}

fn default_port() -> u16 {
    22
}

fn default_roles() -> Vec<String> {
    vec!["app".to_string()]
}

impl Host {
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && !self.user.is_empty()
    }

    pub fn label(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    pub fn has_any_role(&self, roles: &[String]) -> bool {
        self.roles.iter().any(|r| roles.contains(r))
    }
}

impl Project {
    /// Hosts carrying at least one of `roles`, in configuration order.
    pub fn hosts_for_roles(&self, roles: &[String]) -> Vec<&Host> {
        self.hosts.iter().filter(|h| h.has_any_role(roles)).collect()
    }

    /// Directory that relative local config paths are resolved against.
    pub fn local_root(&self) -> PathBuf {
        match &self.local_path {
            Some(path) if !path.is_empty() => PathBuf::from(shellexpand::tilde(path).to_string()),
            _ => PathBuf::from("."),
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(Error::config_missing_key(
                "hosts",
                Some(path.display().to_string()),
            ));
        }

        if let Some(host) = self.hosts.iter().find(|h| !h.is_valid()) {
            return Err(Error::config_invalid_value(
                "hosts",
                Some(host.label()),
                "Each host needs a non-empty host and user",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load a project by ID from the projects directory.
pub fn load(id: &str) -> Result<Project> {
    for candidate in paths::project_candidates(id)? {
        if candidate.exists() {
            let mut project = load_file(&candidate)?;
            project.id = id.to_string();
            return Ok(project);
        }
    }

    Err(Error::project_not_found(id, find_similar_ids(id)))
}

/// Load a project from an explicit file path. The ID is the file stem.
pub fn load_file(path: &Path) -> Result<Project> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    let mut project = parse(&raw, path)?;
    project.id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    project.source_path = Some(path.to_path_buf());
    project.validate(path)?;

    Ok(project)
}

fn parse(raw: &str, path: &Path) -> Result<Project> {
    let display = path.display().to_string();
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(raw).map_err(|e| Error::config_invalid_toml(display, e)),
        _ => serde_json::from_str(raw).map_err(|e| Error::config_invalid_json(display, e)),
    }
}

/// IDs of every project file in the projects directory.
pub fn list_ids() -> Result<Vec<String>> {
    let dir = paths::projects()?;
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(&dir).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", dir.display())))
    })?;

    let mut ids: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("json" | "toml")))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
        .collect();

    ids.sort();
    ids.dedup();
    Ok(ids)
}

fn find_similar_ids(id: &str) -> Vec<String> {
    let needle = id.to_lowercase();
    list_ids()
        .unwrap_or_default()
        .into_iter()
        .filter(|candidate| {
            let candidate = candidate.to_lowercase();
            candidate.contains(&needle) || needle.contains(&candidate)
        })
        .collect()
}
