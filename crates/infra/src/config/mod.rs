//! Configuration loading
//!
//! Settings come from a JSON/TOML file and `WORKBRIDGE_*` environment
//! variables.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
