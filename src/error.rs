use std::path::PathBuf;

use thiserror::Error;

use crate::{RegistryKind, SmilesError};

/// Errors produced by a fingerprint or descriptor generator for one structure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error(transparent)]
    Smiles(#[from] SmilesError),
    #[error("fingerprint dimension must be positive, got {0}")]
    Dimension(usize),
    #[error("3-D embedding failed: {0}")]
    Embedding(String),
}

/// Problems with the compound data itself.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("{} is missing required column '{column}'", .path.display())]
    MissingColumn { path: PathBuf, column: String },
    #[error("duplicate compound id '{id}' in {}", .path.display())]
    DuplicateId { path: PathBuf, id: String },
    #[error("compound '{id}' has an invalid SMILES '{smiles}'")]
    InvalidSmiles {
        id: String,
        smiles: String,
        #[source]
        source: GeneratorError,
    },
    #[error("descriptor {descriptor} failed for compound '{id}'")]
    Descriptor {
        id: String,
        descriptor: String,
        #[source]
        source: GeneratorError,
    },
    #[error("no valid compounds in the library")]
    EmptyLibrary,
    #[error("no feature columns to render")]
    NoFeatures,
}

#[derive(Error, Debug)]
pub enum TreemapError {
    #[error("unknown {kind} '{name}' (available: {})", .available.join(", "))]
    Lookup {
        kind: RegistryKind,
        name: String,
        available: Vec<String>,
    },
    #[error("failed to access {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read or write CSV {}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("JSON (de)serialization failed")]
    Json(#[from] serde_json::Error),
    #[error("malformed configuration file")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("index error: {0}")]
    Index(String),
}

impl TreemapError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| TreemapError::Io { path, source }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>) -> impl FnOnce(csv::Error) -> Self {
        let path = path.into();
        move |source| TreemapError::Csv { path, source }
    }

    /// Is this a problem with the input data (as opposed to I/O or setup)?
    pub fn is_data_error(&self) -> bool {
        matches!(self, TreemapError::Data(_))
    }
}
