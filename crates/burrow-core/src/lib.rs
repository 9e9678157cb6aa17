//! Core types and traits for the Burrow URL shortener.
//!
//! This crate provides the short code generator, the stored record types and
//! the [`Store`] capability implemented by every storage backend.

pub mod error;
pub mod record;
pub mod shortcode;
pub mod store;

pub use error::{Result, StoreError};
pub use record::{validate_original_url, ShorteningRecord, UserUrl};
pub use shortcode::{ShortCode, SHORT_CODE_LENGTH};
pub use store::Store;
