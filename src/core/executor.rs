// Remote execution seam - the controller only ever talks to a RemoteExecutor

use crate::error::{Error, RemoteCommandFailedDetails, Result, TargetDetails};
use crate::project::Host;
use crate::ssh::{is_transient_ssh_error, CommandOutput, SshClient};

/// Runs shell text on one target host.
///
/// Implementors provide [`run`](RemoteExecutor::run); `execute`, `test` and
/// `capture` interpret its output.
pub trait RemoteExecutor {
    /// Human-readable target, e.g. `deploy@app1.example.com`.
    fn label(&self) -> String;

    fn run(&self, command: &str) -> CommandOutput;

    /// Run a command whose failure must surface: non-zero exit is an error.
    fn execute(&self, command: &str) -> Result<CommandOutput> {
        let output = self.run(command);
        if output.success {
            return Ok(output);
        }
        Err(failure(&self.label(), command, output))
    }

    /// Run a condition. Any non-zero exit, including a connection failure, is `false`.
    fn test(&self, command: &str) -> bool {
        self.run(command).success
    }

    /// Run a condition, but report a failed connection as an error instead of `false`.
    fn check(&self, command: &str) -> Result<bool> {
        let output = self.run(command);
        if output.success {
            Ok(true)
        } else if is_transient_ssh_error(&output) {
            Err(failure(&self.label(), command, output))
        } else {
            Ok(false)
        }
    }

    /// Run a command and return its stdout without the trailing newline.
    fn capture(&self, command: &str) -> Result<String> {
        self.execute(command)
            .map(|output| output.stdout.trim_end().to_string())
    }
}

fn failure(host: &str, command: &str, output: CommandOutput) -> Error {
    let transient = is_transient_ssh_error(&output);
    let err = Error::remote_command_failed(RemoteCommandFailedDetails {
        command: command.to_string(),
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
        target: TargetDetails {
            project_id: None,
            host: Some(host.to_string()),
        },
    });

    if transient {
        err.with_retryable(true)
            .with_hint("The SSH connection failed; check the host is reachable and retry")
    } else {
        err
    }
}

impl RemoteExecutor for SshClient {
    fn label(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn run(&self, command: &str) -> CommandOutput {
        SshClient::execute(self, command)
    }
}

/// One SSH client per host, in the given order.
pub fn clients_for(hosts: &[&Host]) -> Result<Vec<SshClient>> {
    hosts.iter().map(|host| SshClient::from_host(host)).collect()
}
