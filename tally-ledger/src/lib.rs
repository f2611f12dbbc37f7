//! tally-ledger: the payment ledger grid, reconciliation and submission sessions.

pub mod book;
pub mod error;
pub mod export;
pub mod grid;
pub mod layout;
pub mod reconciler;
pub mod reports;
pub mod session;
pub mod setup;
pub mod workbook;

pub use book::{CellKey, Contribution, ContributionBook};
pub use error::LedgerError;
pub use grid::{CellAddress, LedgerBackend, MemoryGrid, Row};
pub use reconciler::{Reconciler, SavedReceipt, SubmitMode};
pub use reports::LedgerSnapshot;
pub use session::{InboundMessage, SessionConfig, SessionError, SessionEvent, SessionManager, SessionState};
pub use setup::{ensure_sheets, setup_sheet, SetupReport};
pub use workbook::CsvWorkbook;
