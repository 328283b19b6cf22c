use crate::error::Result;
use crate::executor::RemoteExecutor;
use crate::utils::token::is_pid;
use serde::Serialize;
use std::time::Duration;

use super::scripts::Scripts;
use super::settings::Settings;
use super::signal::Signal;

/// Result of one script on one host.
#[derive(Debug, Clone, Serialize)]
pub struct HostStep {
    pub host: String,
    pub step: String,
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub project_id: String,
    pub steps: Vec<HostStep>,
    pub finished_at: String,
}

/// Externally observed state of a master, derived from its PID file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Running,
    NotRunning,
    /// PID file present, process gone.
    StalePidfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostStatus {
    pub host: String,
    pub state: ProcessState,
    pub pid_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub old_master_running: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub project_id: String,
    pub hosts: Vec<HostStatus>,
}

/// Drives the lifecycle scripts across a project's hosts, one host at a time.
pub struct Controller<E: RemoteExecutor> {
    project_id: String,
    settings: Settings,
    targets: Vec<E>,
}

impl<E: RemoteExecutor> Controller<E> {
    pub fn new(project_id: impl Into<String>, settings: Settings, targets: Vec<E>) -> Self {
        Self {
            project_id: project_id.into(),
            settings,
            targets,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn scripts(&self) -> Scripts<'_> {
        Scripts::new(&self.settings)
    }

    pub fn start(&self) -> Result<TaskReport> {
        let steps = self.run_everywhere("start", &self.scripts().start_unicorn())?;
        Ok(self.report("start", steps))
    }

    /// Signal the master if it is running. Never fails on a stopped server.
    pub fn stop(&self, signal: Signal) -> Result<TaskReport> {
        let steps = self.run_everywhere("stop", &self.scripts().kill_unicorn(signal))?;
        Ok(self.report("stop", steps))
    }

    pub fn shutdown(&self) -> Result<TaskReport> {
        let steps = self.run_everywhere("shutdown", &self.scripts().kill_unicorn(Signal::Term))?;
        Ok(self.report("shutdown", steps))
    }

    /// Graceful stop, wait `unicorn_restart_sleep_time`, start.
    pub fn restart(&self) -> Result<TaskReport> {
        let mut steps = self.run_everywhere("stop", &self.scripts().kill_unicorn(Signal::Quit))?;
        self.pause();
        steps.extend(self.run_everywhere("start", &self.scripts().start_unicorn())?);
        Ok(self.report("restart", steps))
    }

    /// `USR2` a running master, or start one.
    pub fn duplicate(&self) -> Result<TaskReport> {
        let steps = self.run_everywhere("duplicate", &self.scripts().duplicate_unicorn())?;
        Ok(self.report("duplicate", steps))
    }

    /// Zero-downtime restart: duplicate, wait, then `QUIT` the old master.
    pub fn graceful_restart(&self) -> Result<TaskReport> {
        let mut steps = self.run_everywhere("duplicate", &self.scripts().duplicate_unicorn())?;
        self.pause();
        steps.extend(self.run_everywhere(
            "stop_old",
            &self.scripts().kill_old_unicorn(Signal::Quit),
        )?);
        Ok(self.report("graceful_restart", steps))
    }

    pub fn reload(&self) -> Result<TaskReport> {
        self.signal_task("reload", Signal::Hup, "Reloading Unicorn...")
    }

    pub fn add_worker(&self) -> Result<TaskReport> {
        self.signal_task("add_worker", Signal::Ttin, "Adding a Unicorn worker...")
    }

    pub fn remove_worker(&self) -> Result<TaskReport> {
        self.signal_task("remove_worker", Signal::Ttou, "Removing a Unicorn worker...")
    }

    pub fn status(&self) -> Result<StatusReport> {
        let scripts = self.scripts();
        let mut hosts = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            // An unreachable host is an error, not a stopped server.
            let check = |command: &str| {
                target
                    .check(command)
                    .map_err(|e| e.with_project(&self.project_id))
            };

            let running = check(&scripts.unicorn_is_running())?;
            let state = if running {
                ProcessState::Running
            } else if check(&scripts.pid_file_exists())? {
                ProcessState::StalePidfile
            } else {
                ProcessState::NotRunning
            };

            let pid = if running {
                target
                    .capture(&scripts.read_pid())
                    .ok()
                    .filter(|raw| is_pid(raw))
                    .and_then(|raw| raw.trim().parse().ok())
            } else {
                None
            };

            hosts.push(HostStatus {
                host: target.label(),
                state,
                pid_file: self.settings.unicorn_pid.clone(),
                pid,
                old_master_running: check(&scripts.old_unicorn_is_running())?,
            });
        }

        Ok(StatusReport {
            project_id: self.project_id.clone(),
            hosts,
        })
    }

    fn signal_task(&self, task: &str, signal: Signal, notice: &str) -> Result<TaskReport> {
        let steps = self.run_everywhere(task, &self.scripts().signal_unicorn(signal, notice))?;
        Ok(self.report(task, steps))
    }

    fn run_everywhere(&self, step: &str, script: &str) -> Result<Vec<HostStep>> {
        let mut steps = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            let host = target.label();
            log_status!("unicorn", "{} on {}", step, host);

            let output = target
                .execute(script)
                .map_err(|e| e.with_project(&self.project_id))?;

            for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
                log_status!("unicorn", "[{}] {}", host, line.trim());
            }

            steps.push(HostStep {
                host,
                step: step.to_string(),
                command: script.to_string(),
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code: output.exit_code,
            });
        }

        Ok(steps)
    }

    fn pause(&self) {
        let secs = self.settings.unicorn_restart_sleep_time;
        if secs > 0 {
            log_status!("unicorn", "Waiting {}s for Unicorn to settle", secs);
            std::thread::sleep(Duration::from_secs(secs));
        }
    }

    fn report(&self, task: &str, steps: Vec<HostStep>) -> TaskReport {
        TaskReport {
            task: task.to_string(),
            project_id: self.project_id.clone(),
            steps,
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::CommandOutput;
    use crate::unicorn::settings::UnicornConfig;
    use std::cell::RefCell;

    /// Records every command; answers from a fixed list of (needle, success, stdout).
    struct Scripted {
        label: String,
        answers: Vec<(String, bool, String)>,
        seen: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(label: &str) -> Self {
            Self {
                label: label.to_string(),
                answers: Vec::new(),
                seen: RefCell::new(Vec::new()),
            }
        }

        fn answer(mut self, command: &str, success: bool, stdout: &str) -> Self {
            self.answers
                .push((command.to_string(), success, stdout.to_string()));
            self
        }
    }

    impl RemoteExecutor for Scripted {
        fn label(&self) -> String {
            self.label.clone()
        }

        fn run(&self, command: &str) -> CommandOutput {
            self.seen.borrow_mut().push(command.to_string());
            let (success, stdout) = self
                .answers
                .iter()
                .find(|(cmd, _, _)| cmd == command)
                .map(|(_, ok, out)| (*ok, out.clone()))
                .unwrap_or((true, String::new()));

            CommandOutput {
                stdout,
                stderr: String::new(),
                success,
                exit_code: if success { 0 } else { 1 },
            }
        }
    }

    struct Unreachable;

    impl RemoteExecutor for Unreachable {
        fn label(&self) -> String {
            "deploy@app9".to_string()
        }

        fn run(&self, _command: &str) -> CommandOutput {
            CommandOutput {
                stdout: String::new(),
                stderr: "ssh: connect to host app9 port 22: Connection refused".to_string(),
                success: false,
                exit_code: 255,
            }
        }
    }

    fn settings() -> Settings {
        Settings::from_config(&UnicornConfig {
            app_path: Some("/srv/app".to_string()),
            rails_env: Some("production".to_string()),
            unicorn_pid: Some("/tmp/u.pid".to_string()),
            unicorn_restart_sleep_time: Some(0),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn tasks_visit_hosts_in_order_with_one_command_each() {
        let controller = Controller::new(
            "shop",
            settings(),
            vec![Scripted::new("deploy@app1"), Scripted::new("deploy@app2")],
        );

        let report = controller.stop(Signal::Quit).unwrap();
        let hosts: Vec<&str> = report.steps.iter().map(|s| s.host.as_str()).collect();
        assert_eq!(hosts, vec!["deploy@app1", "deploy@app2"]);
        assert_eq!(report.task, "stop");

        for target in &controller.targets {
            let seen = target.seen.borrow();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0], controller.scripts().kill_unicorn(Signal::Quit));
        }
    }

    #[test]
    fn failed_start_stops_at_the_failing_host() {
        let start = Scripts::new(&settings()).start_unicorn();
        let controller = Controller::new(
            "shop",
            settings(),
            vec![
                Scripted::new("deploy@app1").answer(&start, false, "Config file for production environment was not found"),
                Scripted::new("deploy@app2"),
            ],
        );

        let err = controller.start().unwrap_err();
        assert_eq!(err.code.as_str(), "remote.command_failed");
        assert_eq!(err.details["target"]["projectId"], "shop");
        assert_eq!(err.details["target"]["host"], "deploy@app1");
        assert!(controller.targets[1].seen.borrow().is_empty());
    }

    #[test]
    fn restart_stops_everywhere_before_starting() {
        let controller = Controller::new(
            "shop",
            settings(),
            vec![Scripted::new("deploy@app1"), Scripted::new("deploy@app2")],
        );

        let report = controller.restart().unwrap();
        let steps: Vec<(&str, &str)> = report
            .steps
            .iter()
            .map(|s| (s.step.as_str(), s.host.as_str()))
            .collect();
        assert_eq!(
            steps,
            vec![
                ("stop", "deploy@app1"),
                ("stop", "deploy@app2"),
                ("start", "deploy@app1"),
                ("start", "deploy@app2"),
            ]
        );
    }

    #[test]
    fn graceful_restart_quits_the_old_master() {
        let controller = Controller::new("shop", settings(), vec![Scripted::new("deploy@app1")]);
        let report = controller.graceful_restart().unwrap();

        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[1].step, "stop_old");
        assert!(report.steps[1]
            .command
            .contains("kill -s QUIT `cat /tmp/u.pid.oldbin`"));
    }

    #[test]
    fn reload_and_worker_tasks_send_their_signals() {
        let controller = Controller::new("shop", settings(), vec![Scripted::new("deploy@app1")]);

        assert!(controller.reload().unwrap().steps[0]
            .command
            .contains("kill -s HUP"));
        assert!(controller.add_worker().unwrap().steps[0]
            .command
            .contains("kill -s TTIN"));
        assert!(controller.remove_worker().unwrap().steps[0]
            .command
            .contains("kill -s TTOU"));
    }

    #[test]
    fn status_reports_running_with_pid() {
        let s = settings();
        let scripts = Scripts::new(&s);
        let target = Scripted::new("deploy@app1")
            .answer(&scripts.unicorn_is_running(), true, "")
            .answer(&scripts.read_pid(), true, "4242\n")
            .answer(&scripts.old_unicorn_is_running(), false, "");

        let controller = Controller::new("shop", settings(), vec![target]);
        let status = controller.status().unwrap();

        assert_eq!(status.hosts[0].state, ProcessState::Running);
        assert_eq!(status.hosts[0].pid, Some(4242));
        assert!(!status.hosts[0].old_master_running);
    }

    #[test]
    fn status_detects_stale_pid_file() {
        let s = settings();
        let scripts = Scripts::new(&s);
        let target = Scripted::new("deploy@app1")
            .answer(&scripts.unicorn_is_running(), false, "")
            .answer(&scripts.pid_file_exists(), true, "")
            .answer(&scripts.old_unicorn_is_running(), false, "");

        let controller = Controller::new("shop", settings(), vec![target]);
        let status = controller.status().unwrap();

        assert_eq!(status.hosts[0].state, ProcessState::StalePidfile);
        assert_eq!(status.hosts[0].pid, None);
        // never reads the PID of a dead process
        assert!(!controller.targets[0]
            .seen
            .borrow()
            .contains(&scripts.read_pid()));
    }

    #[test]
    fn status_ignores_garbage_pid_contents() {
        let s = settings();
        let scripts = Scripts::new(&s);
        let target = Scripted::new("deploy@app1")
            .answer(&scripts.unicorn_is_running(), true, "")
            .answer(&scripts.read_pid(), true, "not-a-pid\n");

        let controller = Controller::new("shop", settings(), vec![target]);
        assert_eq!(controller.status().unwrap().hosts[0].pid, None);
    }

    #[test]
    fn status_fails_when_host_is_unreachable() {
        let controller = Controller::new("shop", settings(), vec![Unreachable]);
        let err = controller.status().unwrap_err();

        assert_eq!(err.code.as_str(), "remote.command_failed");
        assert_eq!(err.retryable, Some(true));
        assert_eq!(err.details["exitCode"], 255);
        assert_eq!(err.details["target"]["host"], "deploy@app9");
        assert_eq!(err.details["target"]["projectId"], "shop");
    }
}
