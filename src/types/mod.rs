//! Type definitions for the invoice intake service

pub mod alert;
pub mod claim;
pub mod invoice;

pub use alert::FraudAlert;
pub use claim::{ClaimRow, ClassifiedClaim, DerivedClaimRow};
pub use invoice::{ExtractedPayload, FraudStatus, InvoiceSummary, StoredInvoice, UploadResponse};
