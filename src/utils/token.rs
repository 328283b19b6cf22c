//! String checks on values read back from remote hosts.

use regex::Regex;
use std::sync::OnceLock;

fn pid_pattern() -> &'static Regex {
    static PID: OnceLock<Regex> = OnceLock::new();
    PID.get_or_init(|| Regex::new(r"^\s*[1-9][0-9]*\s*$").expect("static PID regex"))
}

/// True when `raw` holds a single positive process id, as read from a PID file.
pub fn is_pid(raw: &str) -> bool {
    pid_pattern().is_match(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_pid_with_newline() {
        assert!(is_pid("4242\n"));
        assert!(is_pid("1"));
    }

    #[test]
    fn rejects_empty_zero_and_garbage() {
        assert!(!is_pid(""));
        assert!(!is_pid("0"));
        assert!(!is_pid("12 34"));
        assert!(!is_pid("cat: /tmp/u.pid: No such file"));
    }
}
