use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A signal delivered to a Unicorn master with `kill`.
///
/// Named signals are sent as `kill -s NAME`, numeric ones as `kill -N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Graceful shutdown: finish in-flight requests, then exit.
    Quit,
    /// Quick shutdown.
    Term,
    Int,
    /// Reload config and gracefully restart workers.
    Hup,
    /// Re-exec the binary, spawning a new master alongside the old one.
    Usr2,
    /// Add one worker.
    Ttin,
    /// Remove one worker.
    Ttou,
    Number(u8),
}

const NAMED: &[(&str, Signal)] = &[
    ("QUIT", Signal::Quit),
    ("TERM", Signal::Term),
    ("INT", Signal::Int),
    ("HUP", Signal::Hup),
    ("USR2", Signal::Usr2),
    ("TTIN", Signal::Ttin),
    ("TTOU", Signal::Ttou),
];

impl Signal {
    /// Signal 0: delivers nothing, only checks the process exists and can be signaled.
    pub const PROBE: Signal = Signal::Number(0);

    pub fn name(&self) -> Option<&'static str> {
        match self {
            Signal::Quit => Some("QUIT"),
            Signal::Term => Some("TERM"),
            Signal::Int => Some("INT"),
            Signal::Hup => Some("HUP"),
            Signal::Usr2 => Some("USR2"),
            Signal::Ttin => Some("TTIN"),
            Signal::Ttou => Some("TTOU"),
            Signal::Number(_) => None,
        }
    }

    /// The `kill` arguments selecting this signal.
    pub fn kill_args(&self) -> Vec<String> {
        match self {
            Signal::Number(n) => vec![format!("-{}", n)],
            named => vec!["-s".to_string(), named.to_string()],
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Number(n) => write!(f, "{}", n),
            named => f.write_str(named.name().unwrap_or_default()),
        }
    }
}

impl Serialize for Signal {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for Signal {
    type Err = Error;

    /// Accepts `QUIT`, `quit`, `SIGQUIT` or a number such as `3`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();

        if let Ok(n) = trimmed.parse::<u8>() {
            return Ok(Signal::Number(n));
        }

        let upper = trimmed.to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);

        NAMED
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, sig)| *sig)
            .ok_or_else(|| {
                Error::validation_invalid_argument(
                    "signal",
                    format!("Unknown signal '{}'", s),
                    None,
                    Some(NAMED.iter().map(|(n, _)| n.to_string()).collect()),
                )
            })
    }
}
