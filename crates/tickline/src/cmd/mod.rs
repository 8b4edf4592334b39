//! Command implementations for the tickline CLI

pub mod check;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tickline_config::Config;

/// Searched in order when no `--config` is given
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["configs/tickline.toml", "tickline.toml"];

/// Configuration plus the file it came from, if any
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    /// Source for log lines: the file path or "(defaults)"
    pub fn source(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(defaults)".to_string())
    }
}

/// Load configuration
///
/// An explicit path must exist. Without one, the default paths are tried
/// and built-in defaults are used if none exists.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("config file not found: {}", path.display());
        }
        let config = Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        return Ok(LoadedConfig {
            config,
            path: Some(path.to_path_buf()),
        });
    }

    for candidate in DEFAULT_CONFIG_PATHS {
        let path = Path::new(candidate);
        if path.exists() {
            let config = Config::from_file(path)
                .with_context(|| format!("failed to load configuration from {}", candidate))?;
            return Ok(LoadedConfig {
                config,
                path: Some(path.to_path_buf()),
            });
        }
    }

    Ok(LoadedConfig {
        config: Config::default(),
        path: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_path_must_exist() {
        let err = load_config(Some(Path::new("/no/such/tickline.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_explicit_path_loads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\ndefault_capacity = 256").unwrap();

        let loaded = load_config(Some(file.path())).unwrap();
        assert_eq!(loaded.config.engine.default_capacity, 256);
        assert_eq!(loaded.path.as_deref(), Some(file.path()));
        assert_eq!(loaded.source(), file.path().display().to_string());
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\ndefault_capacity = 100").unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(format!("{:#}", err).contains(&file.path().display().to_string()));
    }
}
