//! Provider port: the boundary between the coordinator and whatever LLM
//! backend actually answers prompts.

use async_trait::async_trait;

/// A backend capable of answering a single combined prompt.
///
/// Implementations are expected to be cheap to clone (an API client
/// handle, not the network connection itself) since the coordinator holds
/// one instance for the lifetime of the runtime.
#[async_trait]
pub trait Generate: Send + Sync + 'static {
    /// Send `prompt` to the backend and return its raw text reply.
    ///
    /// # Errors
    ///
    /// Returns `Err` with a human-readable reason on any backend failure
    /// (network, rate limit, malformed response envelope). The coordinator
    /// does not retry at this layer.
    async fn generate(&self, prompt: &str) -> Result<String, String>;
}
