use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base config directory (~/.config/unicorn-deploy/ on Unix, %APPDATA% on Windows)
pub fn config_root() -> Result<PathBuf> {
    if let Ok(custom) = env::var("UNICORN_DEPLOY_HOME") {
        if !custom.is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(&custom).to_string()));
        }
    }

    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("unicorn-deploy"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("unicorn-deploy"))
    }
}

/// Projects directory
pub fn projects() -> Result<PathBuf> {
    Ok(config_root()?.join("projects"))
}

/// Candidate project file paths, in lookup order
pub fn project_candidates(id: &str) -> Result<Vec<PathBuf>> {
    let dir = projects()?;
    Ok(vec![
        dir.join(format!("{}.json", id)),
        dir.join(format!("{}.toml", id)),
    ])
}
