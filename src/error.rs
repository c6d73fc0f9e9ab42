use std::path::PathBuf;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DatasetError {
    #[error("invalid resource name: {0:?}")]
    InvalidResourceName(String),

    #[error("invalid archive format: {0}")]
    InvalidArchiveFormat(String),

    #[error("unknown dataset: {0}")]
    #[diagnostic(help("built-in datasets: blogcatalog; others can be declared in graph-datasets.json"))]
    UnknownDataset(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("download request failed: {0}")]
    Http(String),

    #[error("download returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("cache directory {path} is not writable: {reason}")]
    CacheUnwritable { path: Utf8PathBuf, reason: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("archive extraction failed: {0}")]
    Archive(String),

    #[error("{source_name}:{line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },
}
