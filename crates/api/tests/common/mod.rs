//! Shared helpers for API integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use packforge_db::repositories::{InMemoryJobRepository, InMemoryPackRepository};
use packforge_pipeline::config::{
    ConversionConfig, ConverterConfig, PipelineConfig, StorageConfig,
};
use packforge_pipeline::converter::{ConsoleBuffer, ConversionRequest, ConverterError, PackConverter};
use packforge_pipeline::orchestrator::ConversionOrchestrator;
use packforge_pipeline::service::PackService;
use packforge_pipeline::store::PackStore;
use tempfile::TempDir;
use tower::ServiceExt;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use packforge_api::config::ServerConfig;
use packforge_api::router::build_app_router;
use packforge_api::state::AppState;

pub const BOUNDARY: &str = "packforge-test-boundary";

/// Converter that copies its input to `<stem>_converted.zip`.
pub struct CopyConverter;

#[async_trait]
impl PackConverter for CopyConverter {
    async fn convert(
        &self,
        request: &ConversionRequest,
        console: &mut ConsoleBuffer,
    ) -> Result<(), ConverterError> {
        console.line("copying");
        let inputs: Vec<_> = std::fs::read_dir(&request.input_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        for path in inputs {
            let stem = path.file_stem().unwrap().to_string_lossy().into_owned();
            std::fs::copy(&path, request.input_dir.join(format!("{stem}_converted.zip"))).unwrap();
        }
        Ok(())
    }
}

/// Build a test `ServerConfig` rooted at `dir`.
pub fn test_config(dir: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 1024 * 1024,
        database_url: None,
        pipeline: PipelineConfig {
            storage: StorageConfig {
                upload_dir: dir.path().join("uploads"),
                scratch_dir: Some(dir.path().join("scratch")),
            },
            conversion: ConversionConfig::default(),
            converter: ConverterConfig {
                program: "true".into(),
                args: Vec::new(),
            },
        },
    }
}

/// A full application over in-memory repositories and a temporary store.
pub struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);

        let store = PackStore::open(&config.pipeline.storage).await.unwrap();
        let packs = Arc::new(InMemoryPackRepository::new());
        let jobs = Arc::new(InMemoryJobRepository::new());

        let state = AppState {
            pool: None,
            packs: Arc::new(PackService::new(packs.clone(), store.clone())),
            orchestrator: Arc::new(ConversionOrchestrator::new(
                packs,
                jobs,
                store,
                Arc::new(CopyConverter),
                config.pipeline.conversion.clone(),
            )),
        };
        let router = build_app_router(state.clone(), &config);

        Self { dir, state, router }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// POST a multipart upload with `bytes` in field `field`.
    pub async fn upload(&self, field: &str, filename: &str, bytes: &[u8]) -> Response<Body> {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/resourcepacks")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(field, filename, bytes)))
                .unwrap(),
        )
        .await
    }
}

pub fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    write!(
        body,
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/zip\r\n\r\n"
    )
    .unwrap();
    body.extend_from_slice(bytes);
    write!(body, "\r\n--{BOUNDARY}--\r\n").unwrap();
    body
}

pub fn pack_zip(pack_format: i32) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("pack.mcmeta", SimpleFileOptions::default())
        .unwrap();
    write!(writer, r#"{{"pack":{{"pack_format":{pack_format},"description":"test"}}}}"#).unwrap();
    writer.start_file("dummy.txt", SimpleFileOptions::default()).unwrap();
    writer.write_all(b"hello").unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn zip_without_manifest() -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file("dummy.txt", SimpleFileOptions::default()).unwrap();
    writer.write_all(b"hello").unwrap();
    writer.finish().unwrap().into_inner()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
