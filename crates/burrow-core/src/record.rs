use crate::error::{Result, StoreError};
use crate::shortcode::ShortCode;
use serde::{Deserialize, Serialize};

/// A stored mapping from a short code to the URL it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShorteningRecord {
    /// The user that created the mapping. Fixed at creation.
    pub user_id: String,
    /// The code derived from `original_url`.
    pub short_code: ShortCode,
    /// The original URL that was shortened.
    pub original_url: String,
    /// Soft delete flag. Once set, the record no longer resolves.
    pub deleted: bool,
}

/// One entry of a user's listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUrl {
    /// The short code prefixed with the public base URL.
    pub short_url: String,
    pub original_url: String,
}

/// Rejects URLs that cannot be stored.
///
/// Only emptiness is checked here; URL policy belongs to the caller.
pub fn validate_original_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(StoreError::InvalidUrl("URL cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_urls_are_rejected() {
        assert!(validate_original_url("https://example.com").is_ok());
        assert!(matches!(
            validate_original_url(""),
            Err(StoreError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_original_url("  \n"),
            Err(StoreError::InvalidUrl(_))
        ));
    }
}
