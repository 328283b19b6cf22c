use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{config, unicorn, TargetArgs};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "unicorn-deploy")]
#[command(version = VERSION)]
#[command(about = "Start, stop and hot-restart Unicorn app servers over SSH")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start Unicorn, unless it is already running
    Start(TargetArgs),
    /// Stop Unicorn (QUIT, graceful, by default)
    Stop(unicorn::StopArgs),
    /// Stop Unicorn immediately (TERM)
    Shutdown(TargetArgs),
    /// Stop, wait, then start Unicorn
    Restart(TargetArgs),
    /// Spawn a new master next to the running one (USR2), or start if none
    Duplicate(TargetArgs),
    /// Duplicate, wait, then stop the old master
    GracefulRestart(TargetArgs),
    /// Reload config and restart workers (HUP)
    Reload(TargetArgs),
    /// Add one worker (TTIN)
    AddWorker(TargetArgs),
    /// Remove one worker (TTOU)
    RemoveWorker(TargetArgs),
    /// Report whether Unicorn runs on each host
    Status(TargetArgs),
    /// Inspect project configuration
    Config(config::ConfigArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    if let Err(err) = output::print_json_result(json_result) {
        eprintln!("{}", err);
        return std::process::ExitCode::from(exit_code_to_u8(1));
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn stop_accepts_signal_override() {
        let cli = Cli::try_parse_from(["unicorn-deploy", "stop", "shop", "--signal", "term"]).unwrap();
        match cli.command {
            Commands::Stop(args) => {
                assert_eq!(args.signal, unicorn_deploy::unicorn::Signal::Term);
                assert_eq!(args.target.project.as_deref(), Some("shop"));
            }
            _ => panic!("expected stop"),
        }
    }

    #[test]
    fn role_flag_is_repeatable() {
        let cli = Cli::try_parse_from([
            "unicorn-deploy",
            "start",
            "shop",
            "--role",
            "web",
            "--role",
            "worker",
        ])
        .unwrap();
        match cli.command {
            Commands::Start(target) => assert_eq!(target.roles, vec!["web", "worker"]),
            _ => panic!("expected start"),
        }
    }

    #[test]
    fn project_and_file_conflict() {
        assert!(Cli::try_parse_from([
            "unicorn-deploy",
            "status",
            "shop",
            "--file",
            "/tmp/shop.json"
        ])
        .is_err());
    }

    #[test]
    fn exit_codes_are_clamped() {
        assert_eq!(exit_code_to_u8(-1), 0);
        assert_eq!(exit_code_to_u8(20), 20);
        assert_eq!(exit_code_to_u8(300), 255);
    }
}
