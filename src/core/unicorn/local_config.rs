//! Reading the Unicorn config file on the deploying machine.

use super::settings::Settings;
use crate::ssh::execute_local_command_in_dir;
use crate::utils::shell::quote_path;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The local Unicorn config: `unicorn_config_rel_file_path` when it exists under
/// `root`, the stage-specific file otherwise.
pub fn resolve_config_path(settings: &Settings, root: &Path) -> PathBuf {
    let primary = root.join(&settings.unicorn_config_rel_file_path);
    if primary.exists() {
        primary
    } else {
        root.join(&settings.unicorn_config_stage_rel_file_path)
    }
}

/// Evaluate the local Unicorn config and return the PID path it declares.
///
/// The config is loaded by `unicorn_local_bin` (a command prefix such as
/// `unicorn` or `bundle exec unicorn`) through a stub that disables
/// `working_directory`, prints `set[:pid]` and exits before any server starts.
/// Any failure yields `None`.
pub fn extract_pid_file(settings: &Settings, root: &Path) -> Option<String> {
    let config = resolve_config_path(settings, root);
    if !config.is_file() {
        return None;
    }

    let mut stub = tempfile::Builder::new()
        .prefix("unicorn")
        .suffix(".rb")
        .tempfile()
        .ok()?;
    stub.write_all(pid_stub(&config).as_bytes()).ok()?;
    stub.flush().ok()?;

    let command = format!(
        "{} -c {}",
        settings.unicorn_local_bin,
        quote_path(&stub.path().to_string_lossy())
    );
    let root_dir = root.to_string_lossy();
    let output = execute_local_command_in_dir(&command, Some(root_dir.as_ref()));

    if !output.success {
        log_status!(
            "config",
            "Could not read PID path from {} (exit {})",
            config.display(),
            output.exit_code
        );
        return None;
    }

    let pid = output.stdout.trim_end();
    if pid.is_empty() {
        None
    } else {
        Some(pid.to_string())
    }
}

fn pid_stub(config: &Path) -> String {
    format!(
        "config_file = {}\n\
         \n\
         # runs on the deploying machine, where the remote directory does not exist\n\
         def working_directory(path); end\n\
         \n\
         instance_eval(File.read(config_file), config_file) if config_file\n\
         puts set[:pid]\n\
         exit 0\n",
        ruby_string(&config.to_string_lossy())
    )
}

fn ruby_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
