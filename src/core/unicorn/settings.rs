//! Unicorn configuration: the raw keys read from a project file and the
//! validated [`Settings`] record every command builder works from.

use crate::error::{Error, Result};
use crate::project::Project;
use serde::{Deserialize, Serialize};

use super::local_config;

/// Raw `unicorn_*` keys as written in a project file. Everything is optional
/// here; [`Settings::from_config`] fills in defaults and rejects what is missing.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UnicornConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rails_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_gemfile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_pid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_rack_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_bin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_local_bin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_restart_sleep_time: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_config_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_config_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_config_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_config_stage_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_config_rel_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_config_rel_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn_config_stage_rel_file_path: Option<String>,
}

/// Where the PID file path in [`Settings::unicorn_pid`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PidSource {
    Configured,
    ExtractedFromConfig,
    Default,
}

/// Fully resolved configuration. Built once per invocation; read-only after.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Settings {
    pub app_path: String,
    pub rails_env: String,
    pub bundle_gemfile: String,

    pub unicorn_pid: String,
    pub pid_source: PidSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unicorn_user: Option<String>,
    pub unicorn_env: String,
    pub unicorn_rack_env: String,
    pub unicorn_bin: String,
    pub unicorn_local_bin: String,
    pub unicorn_bundle: String,
    /// Extra Unicorn arguments, passed to the remote shell as written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unicorn_options: Option<String>,
    pub unicorn_roles: Vec<String>,
    pub unicorn_restart_sleep_time: u64,

    pub unicorn_config_path: String,
    pub unicorn_config_filename: String,
    pub unicorn_config_file_path: String,
    pub unicorn_config_stage_file_path: String,
    pub unicorn_config_rel_path: String,
    pub unicorn_config_rel_file_path: String,
    pub unicorn_config_stage_rel_file_path: String,
}

const DEFAULT_ROLE: &str = "app";
const DEFAULT_RESTART_SLEEP_SECS: u64 = 2;

impl Settings {
    /// Resolve settings for a project. When no `unicorn_pid` is configured the
    /// local Unicorn config is evaluated to find the PID path it declares.
    pub fn resolve(project: &Project) -> Result<Settings> {
        let mut settings = Self::from_config(&project.unicorn)?;

        if settings.pid_source == PidSource::Default {
            if let Some(pid) = local_config::extract_pid_file(&settings, &project.local_root()) {
                log_status!("config", "Using PID file declared in Unicorn config: {}", pid);
                settings.unicorn_pid = pid;
                settings.pid_source = PidSource::ExtractedFromConfig;
            }
        }

        Ok(settings)
    }

    /// Validate required keys and derive every default. Does not touch the
    /// filesystem.
    pub fn from_config(config: &UnicornConfig) -> Result<Settings> {
        let app_path = required(&config.app_path, "app_path")?;
        let rails_env = required(&config.rails_env, "rails_env")?;

        let unicorn_env = or_default(&config.unicorn_env, || rails_env.clone());
        let unicorn_rack_env = or_default(&config.unicorn_rack_env, || {
            if rails_env == "development" {
                "development".to_string()
            } else {
                "deployment".to_string()
            }
        });

        let unicorn_config_path =
            or_default(&config.unicorn_config_path, || join(&app_path, "config"));
        let unicorn_config_filename =
            or_default(&config.unicorn_config_filename, || "unicorn.rb".to_string());
        let unicorn_config_file_path = or_default(&config.unicorn_config_file_path, || {
            join(&unicorn_config_path, &unicorn_config_filename)
        });
        let unicorn_config_stage_file_path =
            or_default(&config.unicorn_config_stage_file_path, || {
                join(&unicorn_config_path, &format!("unicorn/{}.rb", unicorn_env))
            });

        let unicorn_config_rel_path =
            or_default(&config.unicorn_config_rel_path, || "config".to_string());
        let unicorn_config_rel_file_path = or_default(&config.unicorn_config_rel_file_path, || {
            join(&unicorn_config_rel_path, &unicorn_config_filename)
        });
        let unicorn_config_stage_rel_file_path =
            or_default(&config.unicorn_config_stage_rel_file_path, || {
                join(&unicorn_config_rel_path, &format!("unicorn/{}.rb", unicorn_env))
            });

        let (unicorn_pid, pid_source) = match non_empty(&config.unicorn_pid) {
            Some(pid) => (pid, PidSource::Configured),
            None => (join(&app_path, "tmp/pids/unicorn.pid"), PidSource::Default),
        };

        let unicorn_roles = match &config.unicorn_roles {
            Some(roles) if !roles.is_empty() => roles.clone(),
            Some(_) => {
                return Err(Error::config_invalid_value(
                    "unicorn_roles",
                    Some("[]".to_string()),
                    "At least one role is required",
                ))
            }
            None => vec![DEFAULT_ROLE.to_string()],
        };

        let unicorn_bin = or_default(&config.unicorn_bin, || "unicorn".to_string());

        Ok(Settings {
            bundle_gemfile: or_default(&config.bundle_gemfile, || join(&app_path, "Gemfile")),
            unicorn_pid,
            pid_source,
            unicorn_user: non_empty(&config.unicorn_user),
            unicorn_env,
            unicorn_rack_env,
            unicorn_local_bin: or_default(&config.unicorn_local_bin, || unicorn_bin.clone()),
            unicorn_bin,
            unicorn_bundle: or_default(&config.unicorn_bundle, || "bundle".to_string()),
            unicorn_options: non_empty(&config.unicorn_options),
            unicorn_roles,
            unicorn_restart_sleep_time: config
                .unicorn_restart_sleep_time
                .unwrap_or(DEFAULT_RESTART_SLEEP_SECS),
            unicorn_config_path,
            unicorn_config_filename,
            unicorn_config_file_path,
            unicorn_config_stage_file_path,
            unicorn_config_rel_path,
            unicorn_config_rel_file_path,
            unicorn_config_stage_rel_file_path,
            app_path,
            rails_env,
        })
    }

    /// Roles whose hosts run Unicorn.
    pub fn unicorn_roles(&self) -> &[String] {
        &self.unicorn_roles
    }

    /// PID file the old master writes after a `USR2` binary swap.
    pub fn old_unicorn_pid(&self) -> String {
        format!("{}.oldbin", self.unicorn_pid)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(value: &Option<String>, key: &str) -> Result<String> {
    non_empty(value).ok_or_else(|| Error::config_missing_key(key, None))
}

fn or_default(value: &Option<String>, default: impl FnOnce() -> String) -> String {
    non_empty(value).unwrap_or_else(default)
}

fn join(base: &str, rest: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), rest)
}
