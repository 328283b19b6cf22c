//! Unicorn process lifecycle: settings, command builders and the controller
//! that dispatches them to hosts.

pub mod command;
pub mod controller;
pub mod local_config;
pub mod scripts;
pub mod settings;
pub mod signal;

pub use controller::{Controller, HostStatus, HostStep, ProcessState, StatusReport, TaskReport};
pub use scripts::Scripts;
pub use settings::{PidSource, Settings, UnicornConfig};
pub use signal::Signal;
