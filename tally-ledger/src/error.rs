use tally_core::SubmissionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("sheet {0:?} does not exist")]
    MissingSheet(String),

    #[error("sheet {sheet:?} is malformed: {reason}")]
    Malformed { sheet: String, reason: String },
}

impl From<LedgerError> for SubmissionError {
    fn from(err: LedgerError) -> Self {
        SubmissionError::LedgerUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
