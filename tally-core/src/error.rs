use thiserror::Error;

/// Why a submission was not written to the ledger.
///
/// Every variant is a rejection the submitter can act on; none of them leave the
/// ledger partially mutated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmissionError {
    #[error("could not read both an amount and a beneficiary from the receipt")]
    ExtractionIncomplete,

    #[error("beneficiary {found:?} is not an authorized account holder")]
    BeneficiaryUnverified { found: String },

    #[error("transaction {transaction_id} already recorded in {sheet} row {row}")]
    DuplicateTransaction {
        transaction_id: String,
        sheet: String,
        row: usize,
    },

    #[error("house {0:?} is not in the ledger")]
    UnknownHouse(String),

    #[error("could not determine the payment month")]
    UnknownMonth,

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("text recognition failed: {0}")]
    OcrFailed(String),
}

pub type SubmissionResult<T> = std::result::Result<T, SubmissionError>;
