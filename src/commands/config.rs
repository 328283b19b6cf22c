use clap::{Args, Subcommand};
use serde::Serialize;

use unicorn_deploy::project::{self, Host};
use unicorn_deploy::unicorn::local_config;
use unicorn_deploy::unicorn::{PidSource, Settings};

use super::{CmdResult, TargetArgs};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Display resolved Unicorn settings and the selected hosts
    Show {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Evaluate the local Unicorn config and show the PID file it declares
    Pid {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List project IDs in the projects directory
    List,
}

#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<Settings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hosts: Option<Vec<Host>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid_source: Option<PidSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    projects: Option<Vec<String>>,
}

impl ConfigOutput {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            project_id: None,
            settings: None,
            hosts: None,
            local_config: None,
            pid_file: None,
            pid_source: None,
            projects: None,
        }
    }
}

pub fn run(args: ConfigArgs, _global: &super::GlobalArgs) -> CmdResult<ConfigOutput> {
    match args.command {
        ConfigCommand::Show { target } => show(&target),
        ConfigCommand::Pid { target } => pid(&target),
        ConfigCommand::List => list(),
    }
}

fn show(target: &TargetArgs) -> CmdResult<ConfigOutput> {
    let project = target.load_project()?;
    let settings = Settings::resolve(&project)?;
    let roles = target.effective_roles(&settings);
    let hosts = project
        .hosts_for_roles(&roles)
        .into_iter()
        .cloned()
        .collect();

    Ok((
        ConfigOutput {
            project_id: Some(project.id.clone()),
            settings: Some(settings),
            hosts: Some(hosts),
            ..ConfigOutput::new("config.show")
        },
        0,
    ))
}

fn pid(target: &TargetArgs) -> CmdResult<ConfigOutput> {
    let project = target.load_project()?;
    // Same precedence as every task: configured, extracted, then default.
    let settings = Settings::resolve(&project)?;
    let config = local_config::resolve_config_path(&settings, &project.local_root());

    Ok((
        ConfigOutput {
            project_id: Some(project.id.clone()),
            local_config: Some(config.display().to_string()),
            pid_file: Some(settings.unicorn_pid),
            pid_source: Some(settings.pid_source),
            ..ConfigOutput::new("config.pid")
        },
        0,
    ))
}

fn list() -> CmdResult<ConfigOutput> {
    Ok((
        ConfigOutput {
            projects: Some(project::list_ids()?),
            ..ConfigOutput::new("config.list")
        },
        0,
    ))
}
