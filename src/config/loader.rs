// src/config/loader.rs

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::config::validate::validate_config;
use crate::errors::{Result, WatchcmdError};

/// File name looked up in the project directory when none is given.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "Watchcmd.toml";

/// Commented starter configuration written by [`write_default`].
pub const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("default_config.toml");

/// Load a configuration file and return the raw, unvalidated model.
///
/// A missing file is reported as [`WatchcmdError::ConfigMissing`] carrying the
/// exact path that was tried.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(WatchcmdError::ConfigMissing {
            path: path.to_path_buf(),
        });
    }

    let contents = fs::read_to_string(path)?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// This is the entry point for the rest of the application: relative paths
/// inside the file (`directory`) are resolved against the file's directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;
    validate_config(raw, &config_root_dir(path))
}

/// Directory containing `config_path`, or the current directory for a bare
/// file name.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Resolve the config file name against a project directory.
///
/// Absolute names are used as-is; relative names are joined onto
/// `project_dir`.
pub fn resolve_config_path(project_dir: &Path, file_name: impl AsRef<Path>) -> PathBuf {
    let file_name = file_name.as_ref();
    if file_name.is_absolute() {
        file_name.to_path_buf()
    } else {
        project_dir.join(file_name)
    }
}

/// Write [`DEFAULT_CONFIG_TEMPLATE`] to `path` unless a file is already there.
///
/// Returns `true` when the file was created and `false` when an existing file
/// was left untouched. Missing parent directories are created.
pub fn write_default(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => return Err(err.into()),
    };
    file.write_all(DEFAULT_CONFIG_TEMPLATE.as_bytes())?;
    Ok(true)
}
