//! Typed builders for the shell text sent to a host.
//!
//! [`RemoteCommand`] assembles one simple command (working directory, user
//! switch, environment, program, arguments) and quotes every literal piece.
//! [`Script`] strings statements and `if` blocks into the single line that the
//! executor hands to the remote shell.

use crate::utils::shell::quote_arg;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Arg {
    Literal(String),
    /// Left unquoted so the remote shell expands it (`$VAR`, `` `cat f` ``).
    Expansion(String),
}

impl Arg {
    fn render(&self) -> String {
        match self {
            Arg::Literal(value) => quote_arg(value),
            Arg::Expansion(raw) => raw.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    program: Arg,
    args: Vec<Arg>,
    run_as: Option<String>,
    env: Vec<(String, String)>,
    current_dir: Option<String>,
}

impl RemoteCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_program(Arg::Literal(program.into()))
    }

    /// A command whose program is raw shell text, e.g. `rbenv exec bundle`.
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self::with_program(Arg::Expansion(prefix.into()))
    }

    fn with_program(program: Arg) -> Self {
        Self {
            program,
            args: Vec::new(),
            run_as: None,
            env: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Literal(arg.into()));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(args.into_iter().map(|a| Arg::Literal(a.into())));
        self
    }

    /// Append shell text that must reach the remote shell unquoted.
    pub fn expansion(mut self, raw: impl Into<String>) -> Self {
        self.args.push(Arg::Expansion(raw.into()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run through `sudo -u <user>` when a user is given, as the login user otherwise.
    pub fn run_as(mut self, user: Option<&str>) -> Self {
        self.run_as = user.map(str::to_string);
        self
    }

    pub fn current_dir(mut self, dir: impl Into<String>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(user) = &self.run_as {
            parts.push(format!("sudo -u {}", quote_arg(user)));
        }

        for (key, value) in &self.env {
            parts.push(format!("{}={}", key, quote_arg(value)));
        }

        parts.push(self.program.render());
        parts.extend(self.args.iter().map(Arg::render));

        let command = parts.join(" ");
        match &self.current_dir {
            Some(dir) => format!("cd {} && {}", quote_arg(dir), command),
            None => command,
        }
    }
}

impl std::fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// A sequence of shell statements rendered on one line, each `;`-terminated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    statements: Vec<String>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, statement: impl Into<String>) -> Self {
        self.statements.push(statement.into());
        self
    }

    pub fn command(self, command: &RemoteCommand) -> Self {
        self.push(command.render())
    }

    pub fn echo(self, message: &str) -> Self {
        self.push(format!("echo {}", quote_arg(message)))
    }

    pub fn exit(self, code: i32) -> Self {
        self.push(format!("exit {}", code))
    }

    pub fn assign(self, name: &str, value: &str) -> Self {
        self.push(format!("{}={}", name, quote_arg(value)))
    }

    pub fn if_then(self, condition: &str, then: Script) -> Self {
        let block = format!("if {}; then {} fi", condition, then.body());
        self.push(block)
    }

    pub fn if_else(self, condition: &str, then: Script, otherwise: Script) -> Self {
        let block = format!(
            "if {}; then {} else {} fi",
            condition,
            then.body(),
            otherwise.body()
        );
        self.push(block)
    }

    /// Append every statement of `other`.
    pub fn extend(mut self, other: Script) -> Self {
        self.statements.extend(other.statements);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn render(&self) -> String {
        self.statements
            .iter()
            .map(|s| terminate(s))
            .collect::<Vec<_>>()
            .join(" ")
    }

    // `then`/`else` need at least one command.
    fn body(&self) -> String {
        if self.is_empty() {
            ":;".to_string()
        } else {
            self.render()
        }
    }
}

fn terminate(statement: &str) -> String {
    let trimmed = statement.trim_end();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{};", trimmed)
    }
}
