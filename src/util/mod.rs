//! Small helpers shared by the HTTP client and the CLI.
//!
//! - **Base URL validation**: the backend must be reached over HTTPS
//!   (plain HTTP is tolerated for loopback test servers only)
//! - **Terminal text**: control-character stripping and width-aware truncation
//!   for titles coming from the backend

mod base_url;
mod text;

pub use base_url::{validate_base_url, BaseUrlError};
pub use text::{display_width, sanitize_title, truncate_to_width};
