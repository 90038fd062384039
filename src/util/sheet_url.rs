use thiserror::Error;
use url::Url;

use crate::sheet::extract_document_id;

/// Host and path prefix every spreadsheet link carries.
const SPREADSHEET_MARKER: &str = "docs.google.com/spreadsheets";

/// Reasons a configured spreadsheet URL is rejected.
///
/// The `Display` text is shown to the administrator as-is.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SheetUrlError {
    #[error("Please enter a Google Sheets URL")]
    Empty,
    /// The string is not an absolute URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Please enter a valid Google Sheets URL")]
    NotSpreadsheet,
    #[error("Could not extract the sheet ID from the URL")]
    MissingDocumentId,
}

/// Validate a spreadsheet URL entered during setup.
///
/// # Returns
///
/// The document id on success.
///
/// # Examples
///
/// ```
/// use chapel::util::validate_sheet_url;
///
/// let id = validate_sheet_url("https://docs.google.com/spreadsheets/d/ABC123/edit").unwrap();
/// assert_eq!(id, "ABC123");
///
/// assert!(validate_sheet_url("https://example.com/foo").is_err());
/// ```
pub fn validate_sheet_url(url_str: &str) -> Result<&str, SheetUrlError> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(SheetUrlError::Empty);
    }

    let url = Url::parse(trimmed)?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(SheetUrlError::UnsupportedScheme(scheme.to_owned())),
    }

    if !trimmed.contains(SPREADSHEET_MARKER) {
        return Err(SheetUrlError::NotSpreadsheet);
    }

    extract_document_id(trimmed).ok_or(SheetUrlError::MissingDocumentId)
}

/// `true` when `url_str` passes [`validate_sheet_url`].
pub fn is_valid_sheet_url(url_str: &str) -> bool {
    validate_sheet_url(url_str).is_ok()
}
