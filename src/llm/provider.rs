//! LLM provider trait.
//!
//! Uses async methods for HTTP-based providers.

use std::future::Future;
use std::pin::Pin;

use super::types::{CompletionRequest, ProviderInfo};
use crate::error::Result;

/// Trait for text-generation providers.
///
/// Implemented by the Anthropic and Ollama providers, and by test stubs.
pub trait LlmProvider: Send + Sync {
    /// Get provider metadata.
    fn info(&self) -> ProviderInfo;

    /// Check if the provider can be reached.
    fn is_available(&self) -> impl Future<Output = bool> + Send;

    /// Run one completion and return the generated text.
    fn complete(&self, request: &CompletionRequest) -> impl Future<Output = Result<String>> + Send;
}

/// Boxed provider for runtime selection.
///
/// The trait's `impl Future` methods are not object-safe, so this wraps an
/// object-safe mirror of it.
pub struct BoxedLlm {
    inner: Box<dyn LlmProviderBoxed + Send + Sync>,
}

/// Object-safe version of [`LlmProvider`].
trait LlmProviderBoxed: Send + Sync {
    fn info(&self) -> ProviderInfo;
    fn is_available_boxed(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
    fn complete_boxed(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;
}

impl BoxedLlm {
    /// Box a concrete provider.
    pub fn new<P: LlmProvider + 'static>(provider: P) -> Self {
        Self {
            inner: Box::new(BoxedLlmWrapper(provider)),
        }
    }
}

impl LlmProvider for BoxedLlm {
    fn info(&self) -> ProviderInfo {
        self.inner.info()
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available_boxed().await
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.inner.complete_boxed(request.clone()).await
    }
}

struct BoxedLlmWrapper<P: LlmProvider + 'static>(P);

impl<P: LlmProvider + 'static> LlmProviderBoxed for BoxedLlmWrapper<P> {
    fn info(&self) -> ProviderInfo {
        self.0.info()
    }

    fn is_available_boxed(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(self.0.is_available())
    }

    fn complete_boxed(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        // Owned request keeps the future free of the caller's borrow
        Box::pin(async move { self.0.complete(&request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl LlmProvider for Echo {
        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "echo".to_string(),
                model: "none".to_string(),
            }
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            Ok(request.prompt.to_uppercase())
        }
    }

    #[tokio::test]
    async fn test_boxed_provider_delegates() {
        let boxed = BoxedLlm::new(Echo);
        assert_eq!(boxed.info().name, "echo");
        assert!(boxed.is_available().await);

        let out = boxed
            .complete(&CompletionRequest::new("sys", "hello"))
            .await
            .unwrap();
        assert_eq!(out, "HELLO");
    }
}
