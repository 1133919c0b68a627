use std::path::PathBuf;

use skintwin_ingest_tsv::TsvError;

#[derive(Debug, thiserror::Error)]
pub enum VesselError {
    #[error(transparent)]
    Table(#[from] TsvError),
    #[error("required input not found: {}", path.display())]
    MissingInput { path: PathBuf },
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("vessel {} is not a JSON object", path.display())]
    NotAnObject { path: PathBuf },
    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, VesselError>;

pub(crate) fn io_err(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> VesselError {
    let path = path.into();
    move |source| VesselError::Io { path, source }
}

pub(crate) fn json_err(path: impl Into<PathBuf>) -> impl FnOnce(serde_json::Error) -> VesselError {
    let path = path.into();
    move |source| VesselError::Json { path, source }
}
