// src/error.rs

use crate::resolver::ConflictReport;
use thiserror::Error;

/// Core error types for freeze-requirements
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Cache database initialization error
    #[error("Failed to initialize cache database: {0}")]
    InitError(String),

    /// An archive file name that cannot be split into name and version
    #[error("Can't find distribution name and version for {archive}{}", describe_manifest(.manifest))]
    UnresolvableIdentity {
        archive: String,
        /// Requirements file the archive was downloaded for, when known
        manifest: Option<String>,
    },

    /// The external download tool failed for a requirements file
    #[error("Failed to download packages for {manifest}\n{stdout}\n{stderr}")]
    Fetch {
        manifest: String,
        stdout: String,
        stderr: String,
    },

    /// Version conflicts remained after the retry budget was spent
    #[error("{}", format_conflicts(.attempts, .conflicts))]
    UnresolvedConflicts {
        attempts: usize,
        conflicts: Vec<ConflictReport>,
    },

    /// A cached record that cannot be decoded
    #[error("Corrupted cache entry {hash}: {reason}")]
    CacheCorruption { hash: String, reason: String },

    /// Archive reading or extraction errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// Wheel building failed for a source archive
    #[error("Failed to build wheel for {package}: {reason}")]
    WheelBuild { package: String, reason: String },

    /// Invalid configuration or command line usage
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Attribute a per-file failure to the user's requirements file
    ///
    /// Downloads may run on a filtered temporary copy, so the path recorded
    /// by the fetcher is replaced by `manifest`.
    pub fn required_by(self, manifest: &str) -> Self {
        match self {
            Error::Fetch { stdout, stderr, .. } => Error::Fetch {
                manifest: manifest.to_string(),
                stdout,
                stderr,
            },
            Error::UnresolvableIdentity { archive, .. } => Error::UnresolvableIdentity {
                archive,
                manifest: Some(manifest.to_string()),
            },
            other => other,
        }
    }
}

fn describe_manifest(manifest: &Option<String>) -> String {
    match manifest {
        Some(manifest) => format!(" (required by {})", manifest),
        None => String::new(),
    }
}

fn format_conflicts(attempts: &usize, conflicts: &[ConflictReport]) -> String {
    let mut message = format!(
        "Failed to resolve versions conflicts after {} attempt(s):",
        attempts
    );
    for conflict in conflicts {
        message.push('\n');
        message.push_str(&conflict.to_string());
    }
    message
}

/// Result type alias using freeze-requirements' Error type
pub type Result<T> = std::result::Result<T, Error>;
