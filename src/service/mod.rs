pub mod billing;
pub mod doctor;
pub mod document;
pub mod export;
pub mod filter;
pub mod paginator;
pub mod pricing;
pub mod status;
pub mod tooth;

pub use billing::{BillPage, BillRow, BillingService, BulkPrintOutcome, ItemPriceUpdate, PrintOutcome};
pub use document::{ConsolidatedDocumentBuilder, Document, DocumentKind, DocumentOptions, DocumentSource};
pub use filter::{BillingFilter, StatusFilter};
