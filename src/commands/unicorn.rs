use clap::Args;
use serde::Serialize;

use unicorn_deploy::unicorn::{Signal, StatusReport, TaskReport};

use super::{CmdResult, TargetArgs};

#[derive(Args)]
pub struct StopArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Signal sent to the master (name like QUIT/TERM or a number)
    #[arg(long, default_value = "QUIT")]
    pub signal: Signal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Start,
    Stop(Signal),
    Shutdown,
    Restart,
    Duplicate,
    GracefulRestart,
    Reload,
    AddWorker,
    RemoveWorker,
    Status,
}

pub struct TaskArgs {
    task: Task,
    target: TargetArgs,
}

impl TaskArgs {
    pub fn new(task: Task, target: TargetArgs) -> Self {
        Self { task, target }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UnicornOutput {
    Task(TaskReport),
    Status(StatusReport),
}

pub fn run(args: TaskArgs, _global: &super::GlobalArgs) -> CmdResult<UnicornOutput> {
    let controller = super::controller(&args.target)?;

    let report = match args.task {
        Task::Start => controller.start(),
        Task::Stop(signal) => controller.stop(signal),
        Task::Shutdown => controller.shutdown(),
        Task::Restart => controller.restart(),
        Task::Duplicate => controller.duplicate(),
        Task::GracefulRestart => controller.graceful_restart(),
        Task::Reload => controller.reload(),
        Task::AddWorker => controller.add_worker(),
        Task::RemoveWorker => controller.remove_worker(),
        Task::Status => {
            let status = controller.status()?;
            return Ok((UnicornOutput::Status(status), 0));
        }
    }?;

    Ok((UnicornOutput::Task(report), 0))
}
