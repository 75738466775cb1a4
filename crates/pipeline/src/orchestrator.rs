//! Conversion job lifecycle.
//!
//! A job is created PENDING, then driven by [`ConversionOrchestrator::run_conversion`]
//! through IN_PROGRESS to exactly one of COMPLETED or FAILED. Only the
//! orchestrator mutates a job once it exists.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use packforge_core::error::CoreError;
use packforge_core::hashing;
use packforge_core::naming;
use packforge_core::pack_format;
use packforge_core::types::DbId;
use packforge_db::models::conversion_job::{ConversionJob, NewConversionJob};
use packforge_db::models::pack::{NewPack, Pack};
use packforge_db::models::status::ConversionStatus;
use packforge_db::{JobRepository, PackRepository};
use regex::Regex;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::ConversionConfig;
use crate::converter::{ConsoleBuffer, ConversionRequest, PackConverter};
use crate::error::{ConversionFailure, PipelineError};
use crate::service::{read_metadata, with_optional_metadata};
use crate::store::{move_file, PackStore};

/// Extension assumed when a stored pack has none.
const DEFAULT_EXTENSION: &str = ".zip";

/// Suffix the converter appends to the input file stem.
const CONVERTED_SUFFIX: &str = "_converted";

/// Target versions are path components, so only dotted numerics pass.
static TARGET_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+){1,2}$").expect("valid regex"));

/// Creates, runs and reports on conversion jobs.
pub struct ConversionOrchestrator {
    packs: Arc<dyn PackRepository>,
    jobs: Arc<dyn JobRepository>,
    store: PackStore,
    converter: Arc<dyn PackConverter>,
    config: ConversionConfig,
    /// Serializes the duplicate check with job creation.
    create_lock: Mutex<()>,
}

impl ConversionOrchestrator {
    pub fn new(
        packs: Arc<dyn PackRepository>,
        jobs: Arc<dyn JobRepository>,
        store: PackStore,
        converter: Arc<dyn PackConverter>,
        config: ConversionConfig,
    ) -> Self {
        Self {
            packs,
            jobs,
            store,
            converter,
            config,
            create_lock: Mutex::new(()),
        }
    }

    /// Record a PENDING job for converting `source_pack_id` to
    /// `target_version`. No conversion work happens here.
    pub async fn create_job(
        &self,
        source_pack_id: DbId,
        target_version: &str,
    ) -> Result<ConversionJob, PipelineError> {
        let target_version = target_version.trim();
        if !TARGET_VERSION_RE.is_match(target_version) {
            return Err(CoreError::Validation(format!(
                "Invalid target version '{target_version}', expected e.g. 1.20 or 1.20.1"
            ))
            .into());
        }

        let source = self.find_pack(source_pack_id).await?;
        if source.is_converted {
            return Err(CoreError::Validation(format!(
                "Pack {source_pack_id} is a converted pack and cannot be converted again"
            ))
            .into());
        }

        let _guard = self.create_lock.lock().await;
        if self.config.reject_duplicate_active {
            let active = self
                .jobs
                .find_by_source(source_pack_id)
                .await?
                .into_iter()
                .any(|j| j.target_version == target_version && !j.status.is_terminal());
            if active {
                return Err(CoreError::Conflict(format!(
                    "A conversion of pack {source_pack_id} to {target_version} is already running"
                ))
                .into());
            }
        }

        let job = self
            .jobs
            .create(NewConversionJob {
                source_pack_id,
                target_version: target_version.to_string(),
            })
            .await?;

        tracing::info!(
            job_id = job.id,
            source_pack_id,
            target_version = %job.target_version,
            "Conversion job created",
        );
        Ok(job)
    }

    /// Run `job_id` on a background task and return immediately.
    pub fn spawn_conversion(self: &Arc<Self>, job_id: DbId) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let span = tracing::info_span!("conversion", job_id);
        tokio::spawn(
            async move {
                if let Err(e) = this.run_conversion(job_id).await {
                    tracing::error!(error = %e, "Conversion job could not be run");
                }
            }
            .instrument(span),
        )
    }

    /// Drive a PENDING job to a terminal state.
    ///
    /// Conversion failures end up on the job (FAILED with `error_message`);
    /// the returned error covers only problems reading or persisting the job
    /// itself.
    pub async fn run_conversion(&self, job_id: DbId) -> Result<ConversionJob, PipelineError> {
        let mut job = self.get_job(job_id).await?;

        job.transition_to(ConversionStatus::InProgress)?;
        self.jobs.update(&job).await?;
        tracing::info!(
            job_id,
            source_pack_id = job.source_pack_id,
            target_version = %job.target_version,
            "Conversion started",
        );

        let mut console = ConsoleBuffer::new();
        let outcome = self.execute(&job, &mut console).await;

        if !console.is_empty() {
            job.console_log = Some(console.into_string());
        }

        match outcome {
            Ok(pack) => {
                job.complete()?;
                tracing::info!(job_id, pack_id = pack.id, "Conversion completed");
            }
            Err(failure) => {
                tracing::warn!(job_id, error = %failure, "Conversion failed");
                job.fail(failure.to_string())?;
            }
        }

        self.jobs.update(&job).await?;
        Ok(job)
    }

    pub async fn get_job(&self, job_id: DbId) -> Result<ConversionJob, PipelineError> {
        self.jobs.find_by_id(job_id).await?.ok_or(PipelineError::Core(
            CoreError::NotFound {
                entity: "ConversionJob",
                id: job_id,
            },
        ))
    }

    /// Jobs ever requested for `pack_id`, oldest first.
    pub async fn jobs_for_pack(&self, pack_id: DbId) -> Result<Vec<ConversionJob>, PipelineError> {
        Ok(self.jobs.find_by_source(pack_id).await?)
    }

    async fn find_pack(&self, id: DbId) -> Result<Pack, PipelineError> {
        self.packs
            .find_by_id(id)
            .await?
            .ok_or(PipelineError::Core(CoreError::NotFound { entity: "Pack", id }))
    }

    fn source_version_of(&self, pack: &Pack) -> String {
        pack_format::source_version_from_range(pack.human_version_range.as_deref())
            .unwrap_or(&self.config.default_source_version)
            .to_string()
    }

    /// Steps between IN_PROGRESS and a terminal state.
    async fn execute(
        &self,
        job: &ConversionJob,
        console: &mut ConsoleBuffer,
    ) -> Result<Pack, ConversionFailure> {
        let source = self
            .packs
            .find_by_id(job.source_pack_id)
            .await
            .map_err(|source| ConversionFailure::SourceLookup {
                id: job.source_pack_id,
                source,
            })?
            .ok_or(ConversionFailure::SourceMissing(job.source_pack_id))?;
        let source_path = self.store.path_of(&source.storage_filename);
        let source_version = self.source_version_of(&source);
        let ext = naming::extension_of(&source.storage_filename).unwrap_or(DEFAULT_EXTENSION);

        let scratch = self
            .store
            .scratch_dir()
            .map_err(ConversionFailure::io("Failed to create scratch directory"))?;
        let input_name = Path::new(&source.storage_filename)
            .file_name()
            .map(|n| n.to_owned())
            .unwrap_or_else(|| format!("source{ext}").into());
        tokio::fs::copy(&source_path, scratch.path().join(&input_name))
            .await
            .map_err(ConversionFailure::io("Failed to copy source pack"))?;

        let request = ConversionRequest {
            input_dir: scratch.path().to_path_buf(),
            source_version,
            target_version: job.target_version.clone(),
            verbose: true,
        };
        tracing::debug!(
            job_id = job.id,
            from = %request.source_version,
            to = %request.target_version,
            scratch = %request.input_dir.display(),
            "Invoking converter",
        );
        self.converter.convert(&request, console).await?;

        let artifact = find_artifact(scratch.path(), ext).await?;
        let artifact_name =
            naming::converted_artifact_name(&source.original_filename, &job.target_version, ext);
        let storage_filename =
            PackStore::conversion_storage_name(source.id, &job.target_version, &artifact_name);
        let destination = self.store.path_of(&storage_filename);

        move_file(&artifact, &destination)
            .await
            .map_err(ConversionFailure::io("Failed to move converted pack into the store"))?;

        match self
            .record_conversion(&source, &destination, storage_filename, &job.target_version)
            .await
        {
            Ok(pack) => Ok(pack),
            Err(e) => {
                match tokio::fs::remove_file(&destination).await {
                    Ok(()) => self.store.prune_empty_parents(&destination).await,
                    Err(rm) => tracing::warn!(
                        path = %destination.display(),
                        error = %rm,
                        "Failed to remove orphaned conversion artifact",
                    ),
                }
                Err(e)
            }
        }
    }

    async fn record_conversion(
        &self,
        source: &Pack,
        stored_at: &Path,
        storage_filename: String,
        target_version: &str,
    ) -> Result<Pack, ConversionFailure> {
        let (size_bytes, hash_hex) = hashing::hash_file_sha256(stored_at)
            .await
            .map_err(ConversionFailure::Hashing)?;
        let metadata = read_metadata(stored_at).await;

        let input = with_optional_metadata(
            NewPack::converted(
                source,
                storage_filename,
                size_bytes as i64,
                hash_hex,
                target_version,
            ),
            metadata,
        );
        Ok(self.packs.create(input).await?)
    }
}

/// First entry of `dir` (listing order) named `*_converted{ext}`.
async fn find_artifact(dir: &Path, ext: &str) -> Result<PathBuf, ConversionFailure> {
    let suffix = format!("{CONVERTED_SUFFIX}{ext}");
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(ConversionFailure::io("Failed to list scratch directory"))?;

    let mut found: Option<PathBuf> = None;
    let mut extra = 0usize;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(ConversionFailure::io("Failed to list scratch directory"))?
    {
        if !entry.file_name().to_string_lossy().ends_with(&suffix) {
            continue;
        }
        if found.is_none() {
            found = Some(entry.path());
        } else {
            extra += 1;
        }
    }

    if extra > 0 {
        tracing::warn!(dir = %dir.display(), extra, "Several converted files found, using the first");
    }
    found.ok_or_else(|| ConversionFailure::ArtifactNotFound(dir.to_path_buf()))
}
