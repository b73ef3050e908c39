//! Local embedding model through fastembed.

use super::EmbeddingProvider;
use crate::error::ProviderError;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;

/// Embeddings from a local ONNX model (AllMiniLML6V2 by default, 384
/// dimensions).
///
/// The model is downloaded into `cache_dir` on first use.
pub struct FastEmbedProvider {
    model: Mutex<TextEmbedding>,
    model_name: String,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

impl FastEmbedProvider {
    /// # Errors
    /// Returns [`ProviderError::ModelInit`] if the model name is unknown or the
    /// model fails to download or load.
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, ProviderError> {
        let model = parse_model(model_name)?;
        let model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(false),
        )
        .map_err(|e| {
            ProviderError::ModelInit(format!(
                "{e}. Ensure you have internet connection for first-time model download"
            ))
        })?;

        tracing::info!("Loaded embedding model {model_name}");

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
        })
    }
}

fn parse_model(name: &str) -> Result<EmbeddingModel, ProviderError> {
    match name {
        "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML12V2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "BGESmallENV15" => Ok(EmbeddingModel::BGESmallENV15),
        "BGEBaseENV15" => Ok(EmbeddingModel::BGEBaseENV15),
        other => Err(ProviderError::ModelInit(format!(
            "unknown embedding model '{other}'"
        ))),
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                ProviderError::Request(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(vec![text.to_string()], None)
            .map_err(|e| ProviderError::Request(format!("Failed to generate embedding: {e}")))?;

        embeddings
            .into_iter()
            .next()
            .filter(|e| !e.is_empty())
            .ok_or(ProviderError::EmptyEmbedding)
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}
