//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use packforge_core::types::DbId;
use packforge_db::models::conversion_job::{ConversionJob, NewConversionJob};
use packforge_db::models::pack::{NewPack, Pack};
use packforge_db::models::status::ConversionStatus;
use packforge_db::repositories::{InMemoryJobRepository, InMemoryPackRepository};
use packforge_db::{DbError, JobRepository, PackRepository};
use packforge_pipeline::config::{ConversionConfig, StorageConfig};
use packforge_pipeline::converter::{ConsoleBuffer, ConversionRequest, ConverterError, PackConverter};
use packforge_pipeline::orchestrator::ConversionOrchestrator;
use packforge_pipeline::service::PackService;
use packforge_pipeline::store::PackStore;
use tempfile::TempDir;
use tokio::io::{AsyncRead, ReadBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

// ---------------------------------------------------------------------------
// Archives
// ---------------------------------------------------------------------------

pub fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn manifest(pack_format: i32) -> String {
    format!(r#"{{"pack":{{"pack_format":{pack_format},"description":"test"}}}}"#)
}

/// A valid pack declaring `pack_format`.
pub fn pack_zip(pack_format: i32) -> Vec<u8> {
    zip_with(&[("pack.mcmeta", &manifest(pack_format)), ("dummy.txt", "hello")])
}

/// A valid pack whose manifest carries no usable format.
pub fn pack_zip_without_format() -> Vec<u8> {
    zip_with(&[("pack.mcmeta", "{}"), ("dummy.txt", "hello")])
}

/// Number of regular files directly inside `dir`.
pub fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .count()
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

/// Yields `prefix`, then fails with `kind`.
pub struct BrokenReader {
    prefix: Cursor<Vec<u8>>,
    kind: std::io::ErrorKind,
}

impl BrokenReader {
    pub fn new(prefix: Vec<u8>, kind: std::io::ErrorKind) -> Self {
        Self {
            prefix: Cursor::new(prefix),
            kind,
        }
    }
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let remaining = self.prefix.get_ref().len() as u64 - self.prefix.position();
        if remaining > 0 {
            return Pin::new(&mut self.prefix).poll_read(cx, buf);
        }
        Poll::Ready(Err(std::io::Error::new(self.kind, "stream broke off")))
    }
}

// ---------------------------------------------------------------------------
// Converters
// ---------------------------------------------------------------------------

/// What a stub converter does with its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubBehaviour {
    /// Copy every input file to `<stem>_converted<ext>`.
    Succeed,
    /// Print diagnostics, then fail.
    Fail,
    /// Succeed without producing anything.
    ProduceNothing,
    /// Delete the given pack record mid-run, then behave like `Succeed`.
    DeleteThenSucceed(DbId),
}

/// In-process converter that records every request it sees.
pub struct StubConverter {
    behaviour: StubBehaviour,
    pub requests: Mutex<Vec<ConversionRequest>>,
    packs: Mutex<Option<Arc<FlakyPackRepository>>>,
}

impl StubConverter {
    pub fn new(behaviour: StubBehaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            requests: Mutex::new(Vec::new()),
            packs: Mutex::new(None),
        })
    }

    pub fn requests(&self) -> Vec<ConversionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PackConverter for StubConverter {
    async fn convert(
        &self,
        request: &ConversionRequest,
        console: &mut ConsoleBuffer,
    ) -> Result<(), ConverterError> {
        self.requests.lock().unwrap().push(request.clone());
        console.line(&format!(
            "Converting from {} to {}",
            request.source_version, request.target_version
        ));

        if let StubBehaviour::DeleteThenSucceed(pack_id) = self.behaviour {
            let packs = self.packs.lock().unwrap().clone();
            if let Some(packs) = packs {
                packs.delete(pack_id).await.unwrap();
            }
        }

        match self.behaviour {
            StubBehaviour::Succeed | StubBehaviour::DeleteThenSucceed(_) => {
                let inputs: Vec<_> = std::fs::read_dir(&request.input_dir)
                    .unwrap()
                    .map(|e| e.unwrap().path())
                    .collect();
                for path in inputs {
                    let stem = path.file_stem().unwrap().to_string_lossy().into_owned();
                    let ext = path
                        .extension()
                        .map(|e| format!(".{}", e.to_string_lossy()))
                        .unwrap_or_default();
                    std::fs::copy(&path, request.input_dir.join(format!("{stem}_converted{ext}")))
                        .unwrap();
                }
                Ok(())
            }
            StubBehaviour::Fail => {
                console.line("Unsupported texture layout");
                Err(ConverterError::Failed("Unsupported texture layout".into()))
            }
            StubBehaviour::ProduceNothing => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

/// Pack repository whose lookups can be switched to fail.
#[derive(Default)]
pub struct FlakyPackRepository {
    inner: InMemoryPackRepository,
    fail_lookups: AtomicBool,
}

impl FlakyPackRepository {
    pub fn fail_lookups(&self) {
        self.fail_lookups.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PackRepository for FlakyPackRepository {
    async fn create(&self, input: NewPack) -> Result<Pack, DbError> {
        self.inner.create(input).await
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Pack>, DbError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(DbError::Corrupt("connection reset".into()));
        }
        self.inner.find_by_id(id).await
    }

    async fn find_all(&self) -> Result<Vec<Pack>, DbError> {
        self.inner.find_all().await
    }

    async fn find_originals(&self) -> Result<Vec<Pack>, DbError> {
        self.inner.find_originals().await
    }

    async fn find_conversions(&self, original_id: DbId) -> Result<Vec<Pack>, DbError> {
        self.inner.find_conversions(original_id).await
    }

    async fn delete(&self, id: DbId) -> Result<bool, DbError> {
        self.inner.delete(id).await
    }
}

/// Job repository that records every status it is asked to persist.
#[derive(Default)]
pub struct RecordingJobRepository {
    inner: InMemoryJobRepository,
    pub statuses: Mutex<Vec<ConversionStatus>>,
}

impl RecordingJobRepository {
    pub fn statuses(&self) -> Vec<ConversionStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobRepository for RecordingJobRepository {
    async fn create(&self, input: NewConversionJob) -> Result<ConversionJob, DbError> {
        let job = self.inner.create(input).await?;
        self.statuses.lock().unwrap().push(job.status);
        Ok(job)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<ConversionJob>, DbError> {
        self.inner.find_by_id(id).await
    }

    async fn update(&self, job: &ConversionJob) -> Result<(), DbError> {
        self.inner.update(job).await?;
        self.statuses.lock().unwrap().push(job.status);
        Ok(())
    }

    async fn find_by_source(&self, pack_id: DbId) -> Result<Vec<ConversionJob>, DbError> {
        self.inner.find_by_source(pack_id).await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A pack service and orchestrator over a temporary store.
pub struct Harness {
    pub dir: TempDir,
    pub store: PackStore,
    pub service: PackService,
    pub orchestrator: Arc<ConversionOrchestrator>,
    pub converter: Arc<StubConverter>,
    pub packs: Arc<FlakyPackRepository>,
    pub jobs: Arc<RecordingJobRepository>,
}

impl Harness {
    pub async fn new(behaviour: StubBehaviour) -> Self {
        Self::with_config(behaviour, ConversionConfig::default()).await
    }

    pub async fn with_config(behaviour: StubBehaviour, config: ConversionConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = PackStore::open(&StorageConfig {
            upload_dir: dir.path().join("uploads"),
            scratch_dir: Some(dir.path().join("scratch")),
        })
        .await
        .unwrap();

        let packs = Arc::new(FlakyPackRepository::default());
        let jobs = Arc::new(RecordingJobRepository::default());
        let converter = StubConverter::new(behaviour);
        *converter.packs.lock().unwrap() = Some(packs.clone());

        let service = PackService::new(packs.clone(), store.clone());
        let orchestrator = Arc::new(ConversionOrchestrator::new(
            packs.clone(),
            jobs.clone(),
            store.clone(),
            converter.clone(),
            config,
        ));

        Self {
            dir,
            store,
            service,
            orchestrator,
            converter,
            packs,
            jobs,
        }
    }

    pub fn root(&self) -> &std::path::Path {
        self.store.root()
    }
}
