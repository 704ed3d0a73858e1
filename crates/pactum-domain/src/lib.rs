//! Pactum Domain Layer
//!
//! This crate contains the value types shared by every other Pactum crate and
//! the trait boundary to the external reasoning service.
//!
//! ## Key Concepts
//!
//! - **Document element**: an ordered prose block or markdown table, the input unit
//! - **Contract record**: the canonical, reconciled structured output for one document
//! - **Line item**: an enumerable service or good listed in a contract specification
//! - **Reasoning service**: the fallible remote function that reads text and answers with JSON
//!
//! ## Architecture
//!
//! - No I/O and no runtime dependencies beyond serialization
//! - Infrastructure implementations live in other crates (`pactum-llm`)
//! - The pipeline itself lives in `pactum-extractor`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod element;
mod lenient;
pub mod line_item;
pub mod record;
pub mod traits;

// Re-exports for convenience
pub use element::{DocumentElement, ElementKind, TableMeta};
pub use line_item::LineItem;
pub use record::{Completeness, ContractRecord, Counterparty, Location, ResponsiblePerson};
pub use traits::{ErrorClass, ReasoningError, ReasoningService, RequestKind, ServiceRequest};
