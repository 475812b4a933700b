use std::collections::BTreeMap;

use faceprint_core::provider::run_checked;
use faceprint_core::{
    Capabilities, EmbeddingProvider, FaceAnalysis, OnnxFaceProvider, ProviderError,
};
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;

const REQUEST_QUEUE: usize = 16;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("no face detected in image")]
    NoFaceDetected,
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("no embedding providers available")]
    NoProviders,
    #[error("failed to start engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// A loaded model and what it reports.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub name: String,
    pub capabilities: Capabilities,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Analyze {
        bytes: Vec<u8>,
        reply: oneshot::Sender<Result<FaceAnalysis, EngineError>>,
    },
    AnalyzeAll {
        bytes: Vec<u8>,
        reply: oneshot::Sender<Result<BTreeMap<String, FaceAnalysis>, EngineError>>,
    },
    Status {
        reply: oneshot::Sender<Vec<ModelStatus>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Decode `bytes` and run the primary model on it.
    pub async fn analyze(&self, bytes: Vec<u8>) -> Result<FaceAnalysis, EngineError> {
        self.request(|reply| EngineRequest::Analyze { bytes, reply })
            .await?
    }

    /// Decode `bytes` and run every loaded model, keyed by model name.
    pub async fn analyze_all(
        &self,
        bytes: Vec<u8>,
    ) -> Result<BTreeMap<String, FaceAnalysis>, EngineError> {
        self.request(|reply| EngineRequest::AnalyzeAll { bytes, reply })
            .await?
    }

    pub async fn status(&self) -> Result<Vec<ModelStatus>, EngineError> {
        self.request(|reply| EngineRequest::Status { reply }).await
    }

    /// Stop the engine thread and drop its providers.
    ///
    /// Requests already queued are answered first; later ones fail with
    /// [`EngineError::ChannelClosed`].
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::Shutdown { reply }).await
    }
}

/// Load one ONNX provider per configured model.
///
/// A model pack that fails to load is skipped with a warning; the daemon
/// still starts as long as at least one loads.
pub fn load_onnx_providers(config: &Config) -> Vec<Box<dyn EmbeddingProvider>> {
    let mut providers: Vec<Box<dyn EmbeddingProvider>> = Vec::new();
    for spec in config.model_specs() {
        match OnnxFaceProvider::load(&spec) {
            Ok(p) => providers.push(Box::new(p)),
            Err(e) => {
                tracing::warn!(model = %spec.name, error = %e, "model pack unavailable; skipping");
            }
        }
    }
    providers
}

/// Spawn the engine on a dedicated OS thread.
///
/// The first provider is the primary model. Fails fast if `providers` is
/// empty or the thread cannot be started.
pub fn spawn_engine(
    mut providers: Vec<Box<dyn EmbeddingProvider>>,
) -> Result<EngineHandle, EngineError> {
    if providers.is_empty() {
        return Err(EngineError::NoProviders);
    }
    for p in &providers {
        tracing::info!(model = p.name(), capabilities = ?p.capabilities(), "provider ready");
    }

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(REQUEST_QUEUE);

    std::thread::Builder::new()
        .name("faceprint-engine".into())
        .spawn(move || {
            tracing::info!(models = providers.len(), "engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Shutdown { reply } => {
                        rx.close();
                        while let Ok(pending) = rx.try_recv() {
                            handle(pending, &mut providers);
                        }
                        let _ = reply.send(());
                        break;
                    }
                    other => handle(other, &mut providers),
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn handle(req: EngineRequest, providers: &mut [Box<dyn EmbeddingProvider>]) {
    match req {
        EngineRequest::Analyze { bytes, reply } => {
            let _ = reply.send(decode(&bytes).and_then(|img| run_primary(providers, &img)));
        }
        EngineRequest::AnalyzeAll { bytes, reply } => {
            let _ = reply.send(decode(&bytes).and_then(|img| run_all(providers, &img)));
        }
        EngineRequest::Status { reply } => {
            let _ = reply.send(status(providers));
        }
        EngineRequest::Shutdown { reply } => {
            let _ = reply.send(());
        }
    }
}

fn decode(bytes: &[u8]) -> Result<RgbImage, EngineError> {
    let img = image::load_from_memory(bytes).map_err(|e| EngineError::InvalidImage(e.to_string()))?;
    let rgb = img.to_rgb8();
    tracing::debug!(width = rgb.width(), height = rgb.height(), "image decoded");
    Ok(rgb)
}

fn run_primary(
    providers: &mut [Box<dyn EmbeddingProvider>],
    image: &RgbImage,
) -> Result<FaceAnalysis, EngineError> {
    let provider = providers.first_mut().ok_or(EngineError::NoProviders)?;
    run_checked(&mut **provider, image)?.ok_or(EngineError::NoFaceDetected)
}

/// Run every provider. Models that find no face or fail are left out.
/// With nothing left, the last model error wins over "no face".
fn run_all(
    providers: &mut [Box<dyn EmbeddingProvider>],
    image: &RgbImage,
) -> Result<BTreeMap<String, FaceAnalysis>, EngineError> {
    let mut out = BTreeMap::new();
    let mut last_err = None;
    for provider in providers.iter_mut() {
        match run_checked(&mut **provider, image) {
            Ok(Some(analysis)) => {
                out.insert(provider.name().to_string(), analysis);
            }
            Ok(None) => tracing::warn!(model = provider.name(), "no face detected by model"),
            Err(e) => {
                tracing::warn!(model = provider.name(), error = %e, "model failed, skipping");
                last_err = Some(e);
            }
        }
    }
    if out.is_empty() {
        return Err(last_err.map_or(EngineError::NoFaceDetected, EngineError::Provider));
    }
    Ok(out)
}

fn status(providers: &[Box<dyn EmbeddingProvider>]) -> Vec<ModelStatus> {
    providers
        .iter()
        .map(|p| ModelStatus {
            name: p.name().to_string(),
            capabilities: p.capabilities(),
        })
        .collect()
}
