//! Embedding backends. The production backend wraps a local fastembed
//! model, lazily initialized on first use and cached for the process
//! lifetime. Model inference is CPU-bound and runs under
//! `tokio::task::spawn_blocking`.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::OnceCell;
use tracing::info;

/// Embedding backend seam. Carried as `Arc<dyn Embedder>` so tests swap in
/// a deterministic stub with no model download.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    /// Whether the backend is already loaded in process memory.
    fn is_ready(&self) -> bool;
    /// Human-readable backend name for the status endpoint.
    fn model_name(&self) -> &str;
}

/// Local fastembed model (BGE small), loaded on first embed call.
pub struct LocalEmbedder {
    model: OnceCell<Arc<Mutex<TextEmbedding>>>,
}

impl Default for LocalEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalEmbedder {
    pub fn new() -> Self {
        Self {
            model: OnceCell::new(),
        }
    }

    async fn model(&self) -> Result<Arc<Mutex<TextEmbedding>>> {
        self.model
            .get_or_try_init(|| async {
                info!("Loading local embedding model (first use)");
                let model = tokio::task::spawn_blocking(|| {
                    TextEmbedding::try_new(
                        InitOptions::new(EmbeddingModel::BGESmallENV15)
                            .with_show_download_progress(false),
                    )
                    .map_err(|e| anyhow!("failed to load embedding model: {e}"))
                })
                .await??;
                info!("Embedding model loaded");
                Ok::<_, anyhow::Error>(Arc::new(Mutex::new(model)))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model().await?;
        let text = text.to_string();
        let mut vectors = tokio::task::spawn_blocking(move || {
            let model = model.lock().unwrap();
            model
                .embed(vec![text], None)
                .map_err(|e| anyhow!("embedding failed: {e}"))
        })
        .await??;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("embedding model returned no vector"))
    }

    fn is_ready(&self) -> bool {
        self.model.initialized()
    }

    fn model_name(&self) -> &str {
        "bge-small-en-v1.5"
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// Deterministic stub: hashes characters into a fixed-length vector.
    /// Similar texts do not get similar vectors — tests only rely on
    /// determinism and dimensionality, never semantic closeness.
    pub struct StubEmbedder {
        pub dims: usize,
    }

    impl StubEmbedder {
        pub fn new(dims: usize) -> Self {
            Self { dims }
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0f32; self.dims];
            for (i, c) in text.chars().enumerate() {
                v[i % self.dims] += (c as u32 % 97) as f32 / 97.0;
            }
            Ok(v)
        }

        fn is_ready(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::StubEmbedder;
    use super::*;

    #[tokio::test]
    async fn test_stub_embedder_is_deterministic() {
        let embedder = StubEmbedder::new(8);
        let a = embedder.embed("rust engineer").await.unwrap();
        let b = embedder.embed("rust engineer").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn test_local_embedder_starts_unloaded() {
        let embedder = LocalEmbedder::new();
        assert!(!embedder.is_ready());
        assert_eq!(embedder.model_name(), "bge-small-en-v1.5");
    }
}
