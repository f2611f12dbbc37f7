//! tally-core: Core types for the Tally receipt ledger

pub mod calendar;
pub mod error;
pub mod houses;
pub mod payment;
pub mod time;

pub use calendar::{convert_to_ethiopian_month, EthiopianMonth};
pub use error::{SubmissionError, SubmissionResult};
pub use houses::HouseRegistry;
pub use payment::{
    classify_reason, parse_amount, ExtractedPayment, PaymentReason, ReceiptText, SubmitterId,
};
