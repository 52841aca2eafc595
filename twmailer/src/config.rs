//! Locating and loading the server configuration file.
//!
//! The file is RON and deserialises into [`Twmailer`]:
//!
//! ```ron
//! Twmailer(
//!     listeners: [(socket: "0.0.0.0:6543", max_sessions: 16)],
//!     spool: File(path: "/var/spool/twmailer"),
//!     auth: File(path: "/etc/twmailer/passwd"),
//! )
//! ```

use std::path::{Component, Path, PathBuf};

use anyhow::Context;

use crate::Twmailer;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "TWMAILER_CONFIG";

const DEFAULT_PATHS: [&str; 2] = [
    "./twmailer.config.ron",
    "/etc/twmailer/twmailer.config.ron",
];

/// Find the configuration file using the following precedence:
/// 1. `explicit`, usually from `--config`
/// 2. `TWMAILER_CONFIG` environment variable
/// 3. ./twmailer.config.ron (current working directory)
/// 4. /etc/twmailer/twmailer.config.ron (system-wide config)
///
/// `Ok(None)` means none of the default locations exist.
///
/// # Errors
/// If an explicitly named file does not exist
pub fn find_config_file(explicit: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        anyhow::bail!("Configuration file does not exist: {}", path.display());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!("{CONFIG_ENV} points to non-existent file: {}", path.display());
    }

    Ok(DEFAULT_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists()))
}

/// Every location [`find_config_file`] looks at, for error messages.
#[must_use]
pub fn searched_locations() -> String {
    std::iter::once(format!("  - {CONFIG_ENV} environment variable"))
        .chain(DEFAULT_PATHS.iter().map(|path| format!("  - {path}")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a configuration document.
///
/// # Errors
/// If `content` is not a valid configuration
pub fn parse(content: &str) -> anyhow::Result<Twmailer> {
    Ok(ron::from_str(content)?)
}

/// Read and parse the configuration file at `path`.
///
/// # Errors
/// If the file cannot be read or is not a valid configuration
pub fn load(path: &Path) -> anyhow::Result<Twmailer> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    parse(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
}

/// Resolve a spool directory given on the command line against the working
/// directory, folding away `.` and `..` components.
///
/// # Errors
/// If the working directory cannot be determined
pub fn resolve_spool_dir(path: &Path) -> std::io::Result<PathBuf> {
    Ok(normalize(&std::path::absolute(path)?))
}

fn normalize(path: &Path) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // `..` at the root stays at the root
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    resolved
}
