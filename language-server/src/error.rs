use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("command database not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unrecognized command database layout in {}", path.display())]
    UnrecognizedSchema { path: PathBuf },
}

impl LoadError {
    pub fn path(&self) -> &PathBuf {
        match self {
            LoadError::NotFound { path }
            | LoadError::Io { path, .. }
            | LoadError::Json { path, .. }
            | LoadError::UnrecognizedSchema { path } => path,
        }
    }
}

/// Why a reference token produced no location. Expected and frequent; handlers
/// map it to an empty result instead of reporting it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unresolved {
    #[error("no `{0}` header in this document")]
    NoHeader(String),

    #[error("sibling file {} does not exist", .0.display())]
    MissingFile(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum SiblingError {
    #[error("No workspace folder open.")]
    NoWorkspace,

    #[error("could not scan {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}
