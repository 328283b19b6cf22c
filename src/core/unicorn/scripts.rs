//! Shell scripts for each lifecycle task.
//!
//! Every script is one line of POSIX `sh`. Anything that reads or signals a
//! PID file first checks `[ -e <pidfile> ]`. The existence check and the
//! signal are separate steps with no lock between them, so a concurrent
//! deploy can still race on the same PID file.

use super::command::{RemoteCommand, Script};
use super::settings::Settings;
use super::signal::Signal;
use crate::utils::shell::quote_arg;

pub const MSG_STOPPING: &str = "Stopping Unicorn...";
pub const MSG_NOT_RUNNING: &str = "Unicorn is not running.";
pub const MSG_STOPPING_OLD: &str = "Stopping old Unicorn...";
pub const MSG_OLD_NOT_RUNNING: &str = "Old Unicorn is not running.";
pub const MSG_ALREADY_RUNNING: &str = "Unicorn is already running!";
pub const MSG_STARTING: &str = "Starting Unicorn...";
pub const MSG_DUPLICATING: &str = "Duplicating Unicorn...";

const CONFIG_PATH_VAR: &str = "UNICORN_CONFIG_PATH";

/// Builds the lifecycle scripts for one resolved configuration.
#[derive(Debug, Clone, Copy)]
pub struct Scripts<'a> {
    settings: &'a Settings,
}

impl<'a> Scripts<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Shell expression yielding the PID stored in `pid_file`.
    pub fn get_pid(&self, pid_file: &str) -> String {
        format!("`cat {}`", quote_arg(pid_file))
    }

    /// `kill` for `pid`, switched to `unicorn_user` when one is configured.
    pub fn send_signal(&self, signal: Signal, pid: &str) -> String {
        self.kill(signal, pid).render()
    }

    fn kill(&self, signal: Signal, pid: &str) -> RemoteCommand {
        RemoteCommand::new("kill")
            .run_as(self.settings.unicorn_user.as_deref())
            .args(signal.kill_args())
            .expansion(pid)
    }

    /// Condition that holds only when `pid_file` exists and its PID answers signal 0.
    pub fn process_exists(&self, pid_file: &str) -> String {
        format!(
            "[ -e {} ] && {} > /dev/null 2>&1",
            quote_arg(pid_file),
            self.send_signal(Signal::PROBE, &self.get_pid(pid_file))
        )
    }

    pub fn pid_file_exists(&self) -> String {
        format!("[ -e {} ]", quote_arg(&self.settings.unicorn_pid))
    }

    pub fn unicorn_is_running(&self) -> String {
        self.process_exists(&self.settings.unicorn_pid)
    }

    pub fn old_unicorn_is_running(&self) -> String {
        self.process_exists(&self.settings.old_unicorn_pid())
    }

    pub fn read_pid(&self) -> String {
        format!("cat {}", quote_arg(&self.settings.unicorn_pid))
    }

    /// Send `signal` to the current master if it is running. Never fails.
    pub fn kill_unicorn(&self, signal: Signal) -> String {
        self.signal_if_running(
            &self.settings.unicorn_pid,
            signal,
            MSG_STOPPING,
            MSG_NOT_RUNNING,
        )
    }

    /// Send `signal` to the old master left behind by a `USR2` swap.
    pub fn kill_old_unicorn(&self, signal: Signal) -> String {
        self.signal_if_running(
            &self.settings.old_unicorn_pid(),
            signal,
            MSG_STOPPING_OLD,
            MSG_OLD_NOT_RUNNING,
        )
    }

    /// Send `signal` with a custom notice, e.g. `HUP` for reload.
    pub fn signal_unicorn(&self, signal: Signal, notice: &str) -> String {
        self.signal_if_running(&self.settings.unicorn_pid, signal, notice, MSG_NOT_RUNNING)
    }

    fn signal_if_running(
        &self,
        pid_file: &str,
        signal: Signal,
        notice: &str,
        not_running: &str,
    ) -> String {
        Script::new()
            .if_else(
                &self.process_exists(pid_file),
                Script::new()
                    .echo(notice)
                    .push(self.send_signal(signal, &self.get_pid(pid_file))),
                Script::new().echo(not_running),
            )
            .render()
    }

    /// The command that launches a daemonized master.
    pub fn launch_command(&self) -> RemoteCommand {
        let s = self.settings;
        // `unicorn_bundle` and `unicorn_options` are shell text, not single words.
        let launch = RemoteCommand::prefixed(&s.unicorn_bundle)
            .current_dir(&s.app_path)
            .run_as(s.unicorn_user.as_deref())
            .env("RAILS_ENV", &s.rails_env)
            .env("BUNDLE_GEMFILE", &s.bundle_gemfile)
            .args(["exec", s.unicorn_bin.as_str(), "-c"])
            .expansion(format!("\"${}\"", CONFIG_PATH_VAR))
            .args(["-E", s.unicorn_rack_env.as_str(), "-D"]);

        match &s.unicorn_options {
            Some(options) => launch.expansion(options),
            None => launch,
        }
    }

    fn start(&self) -> Script {
        let s = self.settings;
        let user = s.unicorn_user.as_deref();

        let missing_config = format!(
            "Config file for {} environment was not found at either {} or {}",
            s.unicorn_env, s.unicorn_config_file_path, s.unicorn_config_stage_file_path
        );

        let select_config = Script::new().if_else(
            &format!("[ -e {} ]", quote_arg(&s.unicorn_config_file_path)),
            Script::new().assign(CONFIG_PATH_VAR, &s.unicorn_config_file_path),
            Script::new().if_else(
                &format!("[ -e {} ]", quote_arg(&s.unicorn_config_stage_file_path)),
                Script::new().assign(CONFIG_PATH_VAR, &s.unicorn_config_stage_file_path),
                Script::new().echo(&missing_config).exit(1),
            ),
        );

        let probe = format!(
            "{} > /dev/null 2>&1",
            self.send_signal(Signal::PROBE, &self.get_pid(&s.unicorn_pid))
        );
        let remove_stale = RemoteCommand::new("rm").run_as(user).arg(&s.unicorn_pid);

        let handle_pid_file = Script::new().if_then(
            &self.pid_file_exists(),
            Script::new()
                .if_then(&probe, Script::new().echo(MSG_ALREADY_RUNNING).exit(0))
                .command(&remove_stale),
        );

        select_config
            .extend(handle_pid_file)
            .echo(MSG_STARTING)
            .command(&self.launch_command())
    }

    /// Start a master unless one is already answering on the PID file.
    ///
    /// Exits 1 when neither config path exists on the host, exits 0 without
    /// launching when the master is alive, and removes a stale PID file before
    /// launching.
    pub fn start_unicorn(&self) -> String {
        self.start().render()
    }

    /// `USR2` the running master, or start one when nothing is running.
    pub fn duplicate_unicorn(&self) -> String {
        Script::new()
            .if_else(
                &self.unicorn_is_running(),
                Script::new()
                    .echo(MSG_DUPLICATING)
                    .push(self.send_signal(Signal::Usr2, &self.get_pid(&self.settings.unicorn_pid))),
                self.start(),
            )
            .render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unicorn::settings::UnicornConfig;

    fn settings(user: Option<&str>) -> Settings {
        Settings::from_config(&UnicornConfig {
            app_path: Some("/srv/app".to_string()),
            rails_env: Some("production".to_string()),
            unicorn_pid: Some("/tmp/u.pid".to_string()),
            unicorn_user: user.map(str::to_string),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn send_signal_without_user_has_no_prefix() {
        let s = settings(None);
        assert_eq!(Scripts::new(&s).send_signal(Signal::Term, "1234"), "kill -s TERM 1234");
    }

    #[test]
    fn send_signal_with_user_switches_user() {
        let s = settings(Some("deploy"));
        assert_eq!(
            Scripts::new(&s).send_signal(Signal::Term, "1234"),
            "sudo -u deploy kill -s TERM 1234"
        );
    }

    #[test]
    fn process_exists_checks_file_before_signaling() {
        let s = settings(None);
        assert_eq!(
            Scripts::new(&s).unicorn_is_running(),
            "[ -e /tmp/u.pid ] && kill -0 `cat /tmp/u.pid` > /dev/null 2>&1"
        );
    }

    #[test]
    fn old_master_check_uses_oldbin() {
        let s = settings(None);
        assert!(Scripts::new(&s)
            .old_unicorn_is_running()
            .starts_with("[ -e /tmp/u.pid.oldbin ] && kill -0 `cat /tmp/u.pid.oldbin`"));
    }

    #[test]
    fn kill_script_branches_on_liveness() {
        let s = settings(None);
        assert_eq!(
            Scripts::new(&s).kill_unicorn(Signal::Quit),
            "if [ -e /tmp/u.pid ] && kill -0 `cat /tmp/u.pid` > /dev/null 2>&1; then \
             echo 'Stopping Unicorn...'; kill -s QUIT `cat /tmp/u.pid`; \
             else echo 'Unicorn is not running.'; fi;"
        );
    }

    #[test]
    fn launch_command_carries_env_and_options() {
        let mut s = settings(Some("www"));
        s.unicorn_options = Some("-p 8080".to_string());

        assert_eq!(
            Scripts::new(&s).launch_command().render(),
            "cd /srv/app && sudo -u www RAILS_ENV=production BUNDLE_GEMFILE=/srv/app/Gemfile \
             bundle exec unicorn -c \"$UNICORN_CONFIG_PATH\" -E deployment -D -p 8080"
        );
    }

    #[test]
    fn launch_command_keeps_bundle_prefix_and_options_raw() {
        let mut s = settings(None);
        s.unicorn_bundle = "rbenv exec bundle".to_string();
        s.unicorn_options = Some("--listen \"0.0.0.0:8080\" -p $PORT".to_string());

        assert_eq!(
            Scripts::new(&s).launch_command().render(),
            "cd /srv/app && RAILS_ENV=production BUNDLE_GEMFILE=/srv/app/Gemfile \
             rbenv exec bundle exec unicorn -c \"$UNICORN_CONFIG_PATH\" -E deployment -D \
             --listen \"0.0.0.0:8080\" -p $PORT"
        );

        s.unicorn_bundle = "~/.rbenv/shims/bundle".to_string();
        assert!(Scripts::new(&s)
            .launch_command()
            .render()
            .contains("/Gemfile ~/.rbenv/shims/bundle exec unicorn"));
    }

    #[test]
    fn start_script_selects_config_then_handles_pid_then_launches() {
        let s = settings(None);
        let script = Scripts::new(&s).start_unicorn();

        let primary = script
            .find("[ -e /srv/app/config/unicorn.rb ]")
            .unwrap();
        let fallback = script
            .find("[ -e /srv/app/config/unicorn/production.rb ]")
            .unwrap();
        let missing = script.find("exit 1;").unwrap();
        let running = script.find("echo 'Unicorn is already running!'; exit 0;").unwrap();
        let stale = script.find("rm /tmp/u.pid;").unwrap();
        let launch = script.find("bundle exec unicorn").unwrap();

        assert!(primary < fallback && fallback < missing);
        assert!(missing < running && running < stale && stale < launch);
        assert!(script.contains(
            "Config file for production environment was not found at either \
             /srv/app/config/unicorn.rb or /srv/app/config/unicorn/production.rb"
        ));
    }

    #[test]
    fn duplicate_falls_back_to_the_start_script() {
        let s = settings(None);
        let scripts = Scripts::new(&s);
        let duplicate = scripts.duplicate_unicorn();

        assert!(duplicate.starts_with(&format!("if {}; then", scripts.unicorn_is_running())));
        assert!(duplicate.contains("echo 'Duplicating Unicorn...'; kill -s USR2 `cat /tmp/u.pid`;"));

        let start = scripts.start_unicorn();
        assert!(duplicate.contains(&format!("else {} fi;", start)));
    }

    #[test]
    fn stale_pid_removal_runs_as_unicorn_user() {
        let s = settings(Some("www"));
        assert!(Scripts::new(&s)
            .start_unicorn()
            .contains("sudo -u www rm /tmp/u.pid;"));
    }
}
