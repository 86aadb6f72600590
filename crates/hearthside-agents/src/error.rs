//! Error types for profile loading and validation.
//!
//! Everything here is a configuration error: fatal at startup, before any
//! tick runs. The runtime itself surfaces only store errors.

use std::path::PathBuf;

use hearthside_types::{AgentId, ProfileError};

/// Errors raised while building the profile registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A profile file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A profile file is not valid JSON for the profile schema.
    #[error("failed to parse profile {path}: {source}")]
    Parse {
        /// The offending path.
        path: PathBuf,
        /// The underlying parse error.
        source: serde_json::Error,
    },

    /// A profile failed field validation.
    #[error(transparent)]
    Invalid(#[from] ProfileError),

    /// Two profiles declare the same id.
    #[error("duplicate profile id: {id}")]
    Duplicate {
        /// The duplicated id.
        id: AgentId,
    },

    /// A social connection references an id not present in the roster.
    #[error("profile {id} lists unknown connection {missing}")]
    UnknownConnection {
        /// The profile with the dangling reference.
        id: AgentId,
        /// The id that does not exist.
        missing: AgentId,
    },

    /// No profiles were found at all.
    #[error("no agent profiles were loaded")]
    EmptyRoster,
}
