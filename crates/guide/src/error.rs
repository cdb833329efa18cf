use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GuideError {
    #[error("failed to parse lineup: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid lineup: {0}")]
    Invalid(String),
    #[error("no channel {0} in the lineup")]
    UnknownChannel(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GuideError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GuideError::Io {
            path: path.into(),
            source,
        }
    }
}
