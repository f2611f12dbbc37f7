use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
