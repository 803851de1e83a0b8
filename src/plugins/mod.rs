//! Plugin and dep capability registry.
//!
//! Descriptors declare secrets, install metadata, and lifecycle hooks; the
//! schema builder and hook runner dispatch over them dynamically.

pub mod definition;
pub mod registry;

pub use definition::{
    DepManifest, HookInput, HooksSpec, OnboardHook, PluginManifest, ResolveHook, SecretScope,
    SecretSpec,
};
pub use registry::{Dep, Plugin, PluginRegistry};
