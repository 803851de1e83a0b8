pub mod env_example;
pub mod helpers;
pub mod repair;
pub mod setup;
