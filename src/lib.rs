/// Macro for prefixed status logging to stderr (only when stderr is a terminal).
///
/// Usage:
/// ```ignore
/// log_status!("unicorn", "start on {}", host);
/// log_status!("ssh", "Host '{}' is localhost, using local execution", host);
/// ```
#[macro_export]
macro_rules! log_status {
    ($prefix:expr, $($arg:tt)*) => {
        if ::std::io::IsTerminal::is_terminal(&::std::io::stderr()) {
            eprintln!(concat!("[", $prefix, "] {}"), format_args!($($arg)*));
        }
    };
}

pub mod core;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `unicorn_deploy::unicorn` instead of `unicorn_deploy::core::unicorn`
pub use self::core::*;
pub use self::utils::*;
