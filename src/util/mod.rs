//! Utility functions for common operations.
//!
//! - **URL validation**: Security-focused validation to prevent SSRF attacks
//! - **Text processing**: Control-character stripping, HTML flattening and
//!   width-aware truncation for digest previews

mod text;
mod url_validator;

pub use text::{html_to_plain, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_url, UrlValidationError};
