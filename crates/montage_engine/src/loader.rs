use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;

use engine_logging::{engine_info, engine_warn};

use crate::fetch::map_reqwest_error;
use crate::media::{MediaEngine, StreamCopyEngine};
use crate::{FetchError, FetchFailure};

/// Names of the two static resource blobs the engine is loaded from.
const RUNTIME_ASSET: &str = "engine-core.js";
const PAYLOAD_ASSET: &str = "engine-core.wasm";

/// The two resource blobs a media engine is instantiated from.
#[derive(Debug, Clone)]
pub struct EngineAssets {
    pub runtime: Bytes,
    pub payload: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineLoadError {
    #[error("failed to fetch engine asset {name}: {source}")]
    Asset { name: String, source: FetchError },
    #[error("engine instantiation failed: {0}")]
    Instantiate(String),
}

/// Downloads engine resources and instantiates the engine.
#[async_trait::async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn MediaEngine>, EngineLoadError>;
}

/// Loads the engine from two blobs under a configured base location.
pub struct HttpEngineLoader {
    base_url: String,
    request_timeout: Duration,
}

impl HttpEngineLoader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }

    async fn fetch_asset(&self, name: &str) -> Result<Bytes, EngineLoadError> {
        let url = format!("{}/{name}", self.base_url);
        let wrap = |source: FetchError| EngineLoadError::Asset {
            name: name.to_string(),
            source,
        };

        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|err| wrap(FetchError::new(FetchFailure::Network, err.to_string())))?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|err| wrap(map_reqwest_error(err)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(wrap(FetchError::new(
                FetchFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            )));
        }
        response
            .bytes()
            .await
            .map_err(|err| wrap(map_reqwest_error(err)))
    }
}

#[async_trait::async_trait]
impl EngineLoader for HttpEngineLoader {
    async fn load(&self) -> Result<Arc<dyn MediaEngine>, EngineLoadError> {
        let runtime = self.fetch_asset(RUNTIME_ASSET).await?;
        let payload = self.fetch_asset(PAYLOAD_ASSET).await?;
        engine_info!(
            "engine assets fetched from {} ({} + {} bytes)",
            self.base_url,
            runtime.len(),
            payload.len()
        );
        Ok(Arc::new(StreamCopyEngine::new(EngineAssets {
            runtime,
            payload,
        })))
    }
}

/// Process-wide handle to the lazily loaded engine.
///
/// Replaces the original client's global mutable singleton: the async
/// mutex doubles as the in-flight-load guard, so two callers racing
/// `ensure_loaded` trigger exactly one download. A failed load leaves the
/// cell empty and the next call retries from scratch.
pub struct EngineCell {
    slot: Mutex<Option<Arc<dyn MediaEngine>>>,
}

impl EngineCell {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub async fn ensure_loaded(
        &self,
        loader: &dyn EngineLoader,
    ) -> Result<Arc<dyn MediaEngine>, EngineLoadError> {
        let mut slot = self.slot.lock().await;
        if let Some(engine) = slot.as_ref() {
            return Ok(engine.clone());
        }
        match loader.load().await {
            Ok(engine) => {
                *slot = Some(engine.clone());
                Ok(engine)
            }
            Err(err) => {
                engine_warn!("engine load failed, will retry on next merge: {err}");
                Err(err)
            }
        }
    }

    pub async fn is_loaded(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

impl Default for EngineCell {
    fn default() -> Self {
        Self::new()
    }
}
