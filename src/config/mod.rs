// src/config/mod.rs

//! Pipeline file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a pipeline file from disk (`loader.rs`).
//! - Validate names, references and per-task settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{DEFAULT_CONFIG_FILE, config_root_dir, load_and_validate, load_from_path};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig, TaskKind};
pub use validate::validate_config;
