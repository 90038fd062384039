//! Utility functions for common operations.
//!
//! - **Spreadsheet URL validation**: checks an administrator-entered link
//!   before it is saved, and extracts the document id.
//!
//! # Examples
//!
//! ```
//! use chapel::util::validate_sheet_url;
//!
//! let id = validate_sheet_url("https://docs.google.com/spreadsheets/d/ABC123/edit").unwrap();
//! assert_eq!(id, "ABC123");
//! ```

mod sheet_url;

pub use sheet_url::{is_valid_sheet_url, validate_sheet_url, SheetUrlError};
