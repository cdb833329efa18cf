use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::shaders::CrtTuning;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse overlay configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid overlay configuration: {0}")]
    Invalid(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Contents of `overlay.toml`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    pub title: String,
    /// Initial window size when not fullscreen.
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub always_on_top: bool,
    /// Let pointer input fall through to whatever is underneath.
    pub click_through: bool,
    pub vsync: bool,
    pub tuning: CrtTuning,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            title: "tvguide".to_owned(),
            width: 1280,
            height: 720,
            fullscreen: true,
            always_on_top: true,
            click_through: true,
            vsync: true,
            tuning: CrtTuning::default(),
        }
    }
}

impl OverlayConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: OverlayConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads `path`, or returns the defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no overlay config; using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }

        if let Some((name, value)) = self.tuning.out_of_range() {
            return Err(ConfigError::Invalid(format!(
                "tuning.{name} must be within [0, 1], got {value}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = OverlayConfig::from_toml_str("").unwrap();
        assert_eq!(config, OverlayConfig::default());
        assert!(config.click_through);
    }

    #[test]
    fn parses_window_and_tuning() {
        let config = OverlayConfig::from_toml_str(
            r#"
            fullscreen = false
            width = 800
            height = 600

            [tuning]
            alpha = 0.5
            "#,
        )
        .unwrap();
        assert!(!config.fullscreen);
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.tuning.alpha, 0.5);
        assert_eq!(config.tuning.glitch_threshold, 0.995);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = OverlayConfig::from_toml_str("[tuning]\nglitch_threshold = 1.5").unwrap_err();
        assert!(err.to_string().contains("tuning.glitch_threshold"));
    }

    #[test]
    fn rejects_nan_tuning() {
        let err = OverlayConfig::from_toml_str("[tuning]\nalpha = nan").unwrap_err();
        assert!(err.to_string().contains("tuning.alpha"), "{err}");
    }

    #[test]
    fn rejects_zero_size() {
        let err = OverlayConfig::from_toml_str("width = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = OverlayConfig::from_toml_str("opacity = 0.2").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = OverlayConfig::load_or_default(&dir.path().join("overlay.toml")).unwrap();
        assert_eq!(config, OverlayConfig::default());
    }

    #[test]
    fn reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.toml");
        std::fs::write(&path, "title = \"crt\"\nvsync = false\n").unwrap();
        let config = OverlayConfig::load_or_default(&path).unwrap();
        assert_eq!(config.title, "crt");
        assert!(!config.vsync);
    }
}
