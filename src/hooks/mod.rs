//! Lifecycle hook execution: onboard and resolve hooks run as external
//! scripts with controlled input collection, run-once semantics, and
//! secret-redacted output.

pub mod invoke;
pub mod prompt;
pub mod runner;

pub use invoke::{HookInvocation, DEFAULT_HOOK_TIMEOUT};
pub use prompt::{Prompter, ScriptedPrompter, StdinPrompter};
pub use runner::{HookReport, HookRunner, OnboardOutcome};
