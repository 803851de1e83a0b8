#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod env;
pub mod error;
pub mod hooks;
pub mod identity;
pub mod manifest;
pub mod matcher;
pub mod plugins;
pub mod secrets;
