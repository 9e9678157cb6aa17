use crate::error::StoreError;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Display;

/// Number of characters in every short code.
pub const SHORT_CODE_LENGTH: usize = 8;

/// A short code derived from an original URL.
///
/// Codes are always exactly [`SHORT_CODE_LENGTH`] ASCII alphanumeric
/// characters. The only way to obtain one for a new URL is
/// [`ShortCode::generate`], which makes the code a pure function of the URL.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortCode(String);

impl ShortCode {
    /// Derives the short code for `original_url`.
    ///
    /// The SHA-256 digest of the URL bytes is encoded with the URL-safe base64
    /// alphabet, every non-alphanumeric character is dropped and the first
    /// eight characters are kept. The output is stable across processes and
    /// restarts.
    ///
    /// # Examples
    ///
    /// ```
    /// use burrow_core::ShortCode;
    ///
    /// let code = ShortCode::generate("https://practicum.yandex.ru/");
    /// assert_eq!(code.as_str(), "QrPnX5IU");
    /// ```
    pub fn generate(original_url: &str) -> Self {
        let mut digest = Sha256::digest(original_url.as_bytes());
        let mut code = String::with_capacity(SHORT_CODE_LENGTH);

        loop {
            let encoded = URL_SAFE.encode(&digest);
            code.extend(
                encoded
                    .chars()
                    .filter(char::is_ascii_alphanumeric)
                    .take(SHORT_CODE_LENGTH - code.len()),
            );
            if code.len() == SHORT_CODE_LENGTH {
                return Self(code);
            }
            // not enough alphanumerics left, keep drawing from the re-hashed digest
            digest = Sha256::digest(&digest);
        }
    }

    /// Parses a caller-supplied short code.
    pub fn parse(code: impl Into<String>) -> std::result::Result<Self, StoreError> {
        let code = code.into();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> std::result::Result<(), StoreError> {
        if code.len() != SHORT_CODE_LENGTH {
            return Err(StoreError::InvalidShortCode(format!(
                "length must be {}, got {}",
                SHORT_CODE_LENGTH,
                code.len()
            )));
        }

        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StoreError::InvalidShortCode(format!(
                "must contain only alphanumeric characters: '{}'",
                code
            )));
        }

        Ok(())
    }
}

impl TryFrom<String> for ShortCode {
    type Error = StoreError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ShortCode> for String {
    fn from(value: ShortCode) -> Self {
        value.0
    }
}

impl AsRef<str> for ShortCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
