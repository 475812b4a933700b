//! ONNX Runtime session construction shared by detector and recognizer.

use std::path::Path;

use ort::session::builder::SessionBuilder;
use ort::session::Session;

const INTRA_THREADS: usize = 2;

/// Where inference should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPreference {
    #[default]
    Cpu,
    /// CUDA first, CPU as fallback for unsupported ops.
    Gpu,
}

pub(crate) fn build_session(path: &Path, execution: ExecutionPreference) -> Result<Session, ort::Error> {
    let mut builder = Session::builder()?.with_intra_threads(INTRA_THREADS)?;
    if execution == ExecutionPreference::Gpu {
        builder = register_gpu(builder)?;
    }
    builder.commit_from_file(path)
}

#[cfg(feature = "cuda")]
fn register_gpu(builder: SessionBuilder) -> Result<SessionBuilder, ort::Error> {
    use ort::execution_providers::CUDAExecutionProvider;

    tracing::info!("registering CUDA execution provider");
    builder.with_execution_providers([CUDAExecutionProvider::default().build()])
}

#[cfg(not(feature = "cuda"))]
fn register_gpu(builder: SessionBuilder) -> Result<SessionBuilder, ort::Error> {
    tracing::warn!("GPU execution requested but built without the `cuda` feature; using CPU");
    Ok(builder)
}
