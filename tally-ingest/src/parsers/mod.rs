//! Receipt field parsers. Each compiles its patterns once and exposes
//! `extract(&self, text) -> Option<String>`.

pub mod amount;
pub mod beneficiary;
pub mod date;
pub mod house;
pub mod payer;
pub mod txid;

pub use amount::AmountParser;
pub use beneficiary::BeneficiaryParser;
pub use date::DateParser;
pub use house::HouseParser;
pub use payer::PayerParser;
pub use txid::TxidParser;
