//! Lazily initialised, shared embedding model.

use super::provider::{create_provider, EmbeddingProvider};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use topica_core::config::EmbeddingSettings;
use topica_core::{AppError, AppResult};

type Loader = Box<dyn Fn() -> BoxFuture<'static, AppResult<Arc<dyn EmbeddingProvider>>> + Send + Sync>;

/// Owns the embedding provider and creates it on first use.
///
/// Concurrent first callers wait on the same initialisation; the loader runs
/// once and every caller gets the same instance. If the loader fails, the
/// handle stays empty and the next call tries again.
pub struct ModelHandle {
    cell: OnceCell<Arc<dyn EmbeddingProvider>>,
    loader: Loader,
}

impl ModelHandle {
    /// Handle that runs `loader` on first use.
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Arc<dyn EmbeddingProvider>>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            loader: Box::new(move || loader().boxed()),
        }
    }

    /// Handle around an already constructed provider.
    pub fn ready(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(provider)),
            loader: Box::new(|| {
                async {
                    Err(AppError::Embedding(
                        "Embedding model handle has no loader".to_string(),
                    ))
                }
                .boxed()
            }),
        }
    }

    /// Handle that builds the configured provider on first use.
    pub fn from_settings(settings: EmbeddingSettings) -> Self {
        Self::new(move || {
            let settings = settings.clone();
            async move { create_provider(&settings) }
        })
    }

    /// The provider, initialising it if needed.
    pub async fn get(&self) -> AppResult<Arc<dyn EmbeddingProvider>> {
        let provider = self
            .cell
            .get_or_try_init(|| async {
                tracing::debug!("Initialising embedding model");
                let provider = (self.loader)().await.map_err(|e| match e {
                    AppError::Embedding(_) => e,
                    other => AppError::Embedding(format!(
                        "Failed to initialise embedding model: {}",
                        other
                    )),
                })?;
                tracing::info!(
                    "Embedding model ready: {} ({})",
                    provider.provider_name(),
                    provider.model_name()
                );
                Ok::<_, AppError>(provider)
            })
            .await?;

        Ok(Arc::clone(provider))
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("provider", &self.cell.get())
            .finish()
    }
}
