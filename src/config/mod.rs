// src/config/mod.rs

//! Configuration loading and validation for watchcmd.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk, or write a starter one (`loader.rs`).
//! - Validate it and compile ignore rules and commands (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    DEFAULT_CONFIG_FILE_NAME, DEFAULT_CONFIG_TEMPLATE, config_root_dir, load_and_validate,
    load_from_path, resolve_config_path, write_default,
};
pub use model::{
    ConfigFile, DEFAULT_DELAY_MS, DEFAULT_END_TIMEOUT_MS, RawCommand, RawCondition,
    RawConfigFile, RawIgnore, RawIgnoreRule,
};
pub use validate::validate_config;
