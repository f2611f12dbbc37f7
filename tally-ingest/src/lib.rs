//! tally-ingest: receipt field extraction and beneficiary validation.

pub mod chain;
pub mod error;
pub mod orchestrator;
pub mod parsers;
pub mod text;
pub mod validator;

pub use error::{IngestError, Result};
pub use orchestrator::{ExtractionRequest, ReceiptExtractor};
pub use validator::{BeneficiaryValidator, BeneficiaryVerdict, AUTHORIZED_TOKENS};
