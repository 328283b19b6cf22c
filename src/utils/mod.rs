//! Generic utility primitives with zero domain knowledge.
//!
//! - `shell` - Shell escaping and quoting
//! - `token` - Checks on strings read back from remote hosts

pub mod shell;
pub mod token;
