#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use faceprint_core::{
    BoundingBox, Capabilities, Embedding, EmbeddingProvider, FaceAnalysis, ProviderError,
};
use faceprint_store::ProfileStore;
use faceprintd::{build_router, spawn_engine, AppState, Config};
use image::{Rgb, RgbImage};
use serde_json::Value;
use tower::ServiceExt;

pub const DIM: usize = 512;
const BOUNDARY: &str = "faceprint-test-boundary";

/// Embeds sampled pixel values; a single-colour image has no face.
pub struct PixelProvider {
    pub name: &'static str,
    pub geometry: bool,
}

impl EmbeddingProvider for PixelProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            embedding_dim: DIM,
            landmarks: self.geometry,
            confidence: self.geometry,
        }
    }

    fn detect_and_embed(&mut self, image: &RgbImage) -> Result<Option<FaceAnalysis>, ProviderError> {
        let raw = image.as_raw();
        if raw.is_empty() || raw.chunks_exact(3).all(|p| p == &raw[..3]) {
            return Ok(None);
        }

        let values = (0..DIM)
            .map(|i| raw[i * raw.len() / DIM] as f32 / 255.0 + 0.1)
            .collect();

        let (w, h) = (image.width() as f32, image.height() as f32);
        let landmarks = [
            (w * 0.35, h * 0.4),
            (w * 0.65, h * 0.4),
            (w * 0.5, h * 0.55),
            (w * 0.4, h * 0.7),
            (w * 0.6, h * 0.7),
        ];
        Ok(Some(FaceAnalysis {
            embedding: Embedding::new(values),
            face: Some(BoundingBox {
                x: 0.0,
                y: 0.0,
                width: w,
                height: h,
                confidence: 0.93,
                landmarks: Some(landmarks),
            }),
            landmarks: Some(landmarks),
            confidence: Some(0.93),
            faces_detected: 1,
        }))
    }
}

/// A [`PixelProvider`] that takes `delay` per image.
pub struct SlowProvider {
    pub inner: PixelProvider,
    pub delay: Duration,
}

impl EmbeddingProvider for SlowProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    fn detect_and_embed(&mut self, image: &RgbImage) -> Result<Option<FaceAnalysis>, ProviderError> {
        std::thread::sleep(self.delay);
        self.inner.detect_and_embed(image)
    }
}

/// Router over `store` with the given models, the first one primary.
pub fn app_with(config: Config, store: ProfileStore, providers: Vec<Box<dyn EmbeddingProvider>>) -> Router {
    let engine = spawn_engine(providers).unwrap();
    build_router(Arc::new(AppState::new(config, engine, store)))
}

/// Router over an in-memory store and two stub models, `alpha` (primary)
/// and `beta`.
pub async fn test_app() -> Router {
    let store = ProfileStore::open_in_memory().await.unwrap();
    app_with(
        Config::default(),
        store,
        vec![
            Box::new(PixelProvider { name: "alpha", geometry: true }),
            Box::new(PixelProvider { name: "beta", geometry: false }),
        ],
    )
}

fn png(img: &RgbImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// A synthetic "face": a 64x64 gradient, varied by `seed`.
pub fn face_png(seed: u8) -> Vec<u8> {
    png(&RgbImage::from_fn(64, 64, |x, y| {
        Rgb([
            (x * 4) as u8 ^ seed,
            (y * 4) as u8,
            ((x + y) * 2) as u8 ^ seed.rotate_left(3),
        ])
    }))
}

pub fn white_png() -> Vec<u8> {
    png(&RgbImage::from_pixel(64, 64, Rgb([255, 255, 255])))
}

/// Hand-built `multipart/form-data` body: `(field, content type, bytes)`.
pub fn multipart_request(uri: &str, parts: &[(&str, &str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, content_type, bytes) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.png\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn upload(uri: &str, image: &[u8]) -> Request<Body> {
    multipart_request(uri, &[("file", "image/png", image)])
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Send one request through a clone of `app`.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, json_body(response).await)
}
