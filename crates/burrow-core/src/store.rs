use crate::error::Result;
use crate::record::UserUrl;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

/// The storage capability shared by every backend.
///
/// All methods are cancel-safe in the sense that dropping the returned future
/// never leaves a backend with a half-applied mutation. Callers that need a
/// deadline wrap the call in `tokio::time::timeout`; backends may also apply
/// their own per-statement deadline.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Shortens `original_url` on behalf of `user_id`.
    ///
    /// Returns [`StoreError::Duplicate`](crate::StoreError::Duplicate) carrying
    /// the existing code when the URL already has a mapping, whoever owns it.
    async fn shorten_url(&self, user_id: &str, original_url: &str) -> Result<ShortCode>;

    /// Resolves a short code to its original URL.
    ///
    /// Returns [`StoreError::NotFound`](crate::StoreError::NotFound) when no
    /// live record matches, including records that were soft deleted.
    async fn redirect_url(&self, code: &ShortCode) -> Result<String>;

    /// Shortens a whole batch for `user_id` as one unit.
    ///
    /// Either every item is stored or none is. Codes are returned in input
    /// order; URLs that are already mapped resolve to their existing code.
    async fn batch_shorten_urls(
        &self,
        user_id: &str,
        original_urls: &[String],
    ) -> Result<Vec<ShortCode>>;

    /// Lists the live records owned by `user_id`, with short URLs built from
    /// `base_url`. An empty list is not an error.
    async fn user_urls(&self, user_id: &str, base_url: &str) -> Result<Vec<UserUrl>>;

    /// Soft deletes every listed code owned by `user_id`.
    ///
    /// Codes owned by someone else, unknown codes and already deleted codes are
    /// skipped. Only failures of the operation as a whole are reported.
    async fn delete_user_urls(&self, user_id: &str, codes: &[ShortCode]) -> Result<()>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;
}
