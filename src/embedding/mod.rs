//! Text embedding providers.
//!
//! A provider turns text into a dense vector. Symbols are embedded through
//! [`create_symbol_text`], queries are embedded as given.

#[cfg(feature = "fastembed")]
mod fastembed_provider;
mod retry;

#[cfg(feature = "fastembed")]
pub use fastembed_provider::FastEmbedProvider;
pub use retry::{RetryPolicy, RetryingProvider};

use crate::error::ProviderError;
use crate::types::Symbol;
use std::sync::Arc;

/// Source of embedding vectors.
///
/// Implementations must be thread-safe; the registry shares one provider
/// between every component that needs it.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Short identifier used in log lines.
    fn name(&self) -> &str {
        "embedding-provider"
    }
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<P> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        (**self).embed(text)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Text representation of a symbol sent to the provider.
///
/// Falls back to the definition path when the symbol has no signature:
/// `function parse_json def parse_json(text: str) -> dict`
#[must_use]
pub fn create_symbol_text(symbol: &Symbol) -> String {
    let kind = symbol.kind.as_str();
    let name = &symbol.name;
    match symbol.signature.as_deref() {
        Some(sig) if !sig.trim().is_empty() => format!("{kind} {name} {sig}"),
        _ => format!("{kind} {name} {}", symbol.location.path),
    }
}
