//! Error handling foundation for frontgate.
//!
//! Library crates define their own domain error enums; the boot path wraps
//! them in a rootcause [`Report`] so configuration and startup failures
//! carry their context up to `main`.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
