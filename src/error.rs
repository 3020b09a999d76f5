use polars::prelude::PolarsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Format(#[from] std::fmt::Error),

    #[error("Invalid settings file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Required column '{0}' is missing from the input")]
    MissingColumn(String),

    #[error("No valid records left after cleaning {0}")]
    EmptyDataset(String),

    #[error("Chart rendering failed: {0}")]
    Chart(String),
}
