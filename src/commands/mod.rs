use clap::Args;
use std::path::PathBuf;

use unicorn_deploy::executor::{self, RemoteExecutor};
use unicorn_deploy::log_status;
use unicorn_deploy::project::{self, Project};
use unicorn_deploy::ssh::SshClient;
use unicorn_deploy::unicorn::{Controller, Settings};
use unicorn_deploy::Error;

pub type CmdResult<T> = unicorn_deploy::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

/// Arguments shared by every lifecycle task: which project, and which hosts.
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Project ID (file under the projects directory)
    pub project: Option<String>,

    /// Load the project from this file instead of the projects directory
    #[arg(long, value_name = "PATH", conflicts_with = "project")]
    pub file: Option<String>,

    /// Only act on hosts with this role (repeatable; overrides unicorn_roles)
    #[arg(long = "role", value_name = "ROLE")]
    pub roles: Vec<String>,
}

impl TargetArgs {
    pub fn load_project(&self) -> unicorn_deploy::Result<Project> {
        match (&self.project, &self.file) {
            (Some(id), None) => project::load(id),
            (None, Some(path)) => {
                let expanded = PathBuf::from(shellexpand::tilde(path).to_string());
                project::load_file(&expanded)
            }
            _ => Err(Error::validation_invalid_argument(
                "project",
                "Provide a project ID or --file",
                None,
                None,
            )),
        }
    }

    /// Roles used for host selection: `--role` values when given, else the
    /// project's `unicorn_roles`.
    pub fn effective_roles(&self, settings: &Settings) -> Vec<String> {
        if self.roles.is_empty() {
            settings.unicorn_roles().to_vec()
        } else {
            self.roles.clone()
        }
    }
}

/// Load the project, resolve its settings and connect one client per
/// selected host.
pub(crate) fn controller(target: &TargetArgs) -> unicorn_deploy::Result<Controller<SshClient>> {
    let project = target.load_project()?;
    let settings = Settings::resolve(&project)?;
    let roles = target.effective_roles(&settings);

    let hosts = project.hosts_for_roles(&roles);
    if hosts.is_empty() {
        return Err(Error::validation_invalid_argument(
            "role",
            format!("No hosts in project '{}' carry the selected roles", project.id),
            Some(project.id.clone()),
            Some(roles),
        ));
    }

    let clients = executor::clients_for(&hosts)?;
    log_status!(
        "unicorn",
        "{} host(s): {}",
        clients.len(),
        clients
            .iter()
            .map(|client| client.label())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(Controller::new(project.id, settings, clients))
}

pub mod config;
pub mod unicorn;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (unicorn_deploy::Result<serde_json::Value>, i32) {
    crate::tty::status("unicorn-deploy is working...");

    use unicorn::{Task, TaskArgs};

    match command {
        crate::Commands::Start(target) => dispatch!(TaskArgs::new(Task::Start, target), global, unicorn),
        crate::Commands::Stop(args) => {
            dispatch!(TaskArgs::new(Task::Stop(args.signal), args.target), global, unicorn)
        }
        crate::Commands::Shutdown(target) => {
            dispatch!(TaskArgs::new(Task::Shutdown, target), global, unicorn)
        }
        crate::Commands::Restart(target) => {
            dispatch!(TaskArgs::new(Task::Restart, target), global, unicorn)
        }
        crate::Commands::Duplicate(target) => {
            dispatch!(TaskArgs::new(Task::Duplicate, target), global, unicorn)
        }
        crate::Commands::GracefulRestart(target) => {
            dispatch!(TaskArgs::new(Task::GracefulRestart, target), global, unicorn)
        }
        crate::Commands::Reload(target) => {
            dispatch!(TaskArgs::new(Task::Reload, target), global, unicorn)
        }
        crate::Commands::AddWorker(target) => {
            dispatch!(TaskArgs::new(Task::AddWorker, target), global, unicorn)
        }
        crate::Commands::RemoveWorker(target) => {
            dispatch!(TaskArgs::new(Task::RemoveWorker, target), global, unicorn)
        }
        crate::Commands::Status(target) => {
            dispatch!(TaskArgs::new(Task::Status, target), global, unicorn)
        }
        crate::Commands::Config(args) => dispatch!(args, global, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_flag_overrides_configured_roles() {
        let settings = Settings::from_config(&unicorn_deploy::unicorn::UnicornConfig {
            app_path: Some("/srv/app".to_string()),
            rails_env: Some("production".to_string()),
            unicorn_roles: Some(vec!["web".to_string()]),
            ..Default::default()
        })
        .unwrap();

        let defaults = TargetArgs::default();
        assert_eq!(defaults.effective_roles(&settings), vec!["web".to_string()]);

        let overridden = TargetArgs {
            roles: vec!["worker".to_string()],
            ..Default::default()
        };
        assert_eq!(
            overridden.effective_roles(&settings),
            vec!["worker".to_string()]
        );
    }

    #[test]
    fn project_or_file_is_required() {
        let err = TargetArgs::default().load_project().unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }
}
