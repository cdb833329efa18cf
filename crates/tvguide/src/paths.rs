//! Resolves where tvguide keeps `overlay.toml` and `lineup.toml`.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "TVGUIDE_CONFIG_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "tvguide";
const APPLICATION: &str = "tvguide";

pub const OVERLAY_FILE: &str = "overlay.toml";
pub const LINEUP_FILE: &str = "lineup.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    /// Nothing is created on disk; both files are optional.
    pub fn discover() -> Result<Self> {
        if let Some(config_dir) = env_override(ENV_CONFIG_DIR) {
            return Ok(Self { config_dir });
        }
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn overlay_config(&self) -> PathBuf {
        self.config_dir.join(OVERLAY_FILE)
    }

    pub fn lineup_file(&self) -> PathBuf {
        self.config_dir.join(LINEUP_FILE)
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
