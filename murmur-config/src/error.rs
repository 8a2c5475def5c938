//! Config error type.

use std::path::PathBuf;

/// Why the config could not be read or written.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No home directory to place the config under.
    #[error("could not determine the home directory")]
    NoHome,

    /// Reading or writing failed.
    #[error("config I/O failed at {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid config JSON.
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        /// The file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The config could not be encoded.
    #[error("could not encode config: {0}")]
    Serialize(#[from] serde_json::Error),
}
