//! Configuration resolution for the CLI.
//!
//! Precedence: command-line flags, then the config file, then built-in
//! defaults.

use anyhow::{Context, Result};
use bastion_sync_client::{Config, SourceKind};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is
/// not given.
pub const DEFAULT_CONFIG_FILE: &str = "bastion.toml";

/// Build the effective configuration.
///
/// Without a config file and without `--data-dir`, the change log lives in
/// the platform data directory.
pub fn resolve(config_path: Option<&Path>, data_dir: Option<PathBuf>, mock: bool) -> Result<Config> {
    let (mut config, from_file) = match config_path {
        Some(path) => (Config::from_file(path)?, true),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                (Config::from_file(default)?, true)
            } else {
                (Config::default(), false)
            }
        }
    };

    match data_dir {
        Some(dir) => config.store.path = dir,
        None if !from_file => config.store.path = default_data_dir()?,
        None => {}
    }

    if mock {
        config.backend.source = SourceKind::Mock;
    }

    Ok(config)
}

/// Get the default data directory for bastion.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "bastion-advisory", "bastion")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_sync_client::StoreKind;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn explicit_file_is_used() {
        let file = config_file(
            r#"
[backend]
source = "live"
url = "https://project.example.co"

[store]
kind = "sqlite"
path = "/var/lib/bastion"
"#,
        );

        let config = resolve(Some(file.path()), None, false).unwrap();
        assert_eq!(config.backend.source, SourceKind::Live);
        assert_eq!(config.store.kind, StoreKind::Sqlite);
        assert_eq!(config.store.path, PathBuf::from("/var/lib/bastion"));
    }

    #[test]
    fn flags_override_file() {
        let file = config_file("[backend]\nsource = \"live\"\n");
        let dir = tempdir().unwrap();

        let config = resolve(Some(file.path()), Some(dir.path().to_path_buf()), true).unwrap();
        assert_eq!(config.backend.source, SourceKind::Mock);
        assert_eq!(config.store.path, dir.path());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let result = resolve(Some(&dir.path().join("nope.toml")), None, false);
        assert!(result.is_err());
    }
}
