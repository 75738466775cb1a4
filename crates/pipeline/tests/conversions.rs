//! Conversion job lifecycle through `ConversionOrchestrator`.

mod common;

use assert_matches::assert_matches;
use common::{pack_zip, pack_zip_without_format, Harness, StubBehaviour};
use packforge_core::error::CoreError;
use packforge_core::hashing::sha256_hex;
use packforge_db::models::status::ConversionStatus;
use packforge_pipeline::config::ConversionConfig;
use packforge_pipeline::error::PipelineError;

async fn uploaded(h: &Harness, bytes: Vec<u8>) -> packforge_db::models::pack::Pack {
    h.service.upload(bytes.as_slice(), "Cool Pack.zip").await.unwrap()
}

// ---------------------------------------------------------------------------
// create_job
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_job_is_pending_and_does_no_work() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    let pack = uploaded(&h, pack_zip(15)).await;

    let job = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();

    assert_eq!(job.status, ConversionStatus::Pending);
    assert_eq!(job.source_pack_id, pack.id);
    assert_eq!(job.target_version, "1.21");
    assert_eq!(job.completed_at, None);
    assert!(h.converter.requests().is_empty());
    assert_eq!(h.orchestrator.get_job(job.id).await.unwrap(), job);
}

#[tokio::test]
async fn create_job_for_unknown_pack_is_not_found() {
    let h = Harness::new(StubBehaviour::Succeed).await;

    let err = h.orchestrator.create_job(99, "1.20").await.unwrap_err();

    assert_matches!(
        err,
        PipelineError::Core(CoreError::NotFound { entity: "Pack", id: 99 })
    );
}

#[tokio::test]
async fn create_job_rejects_unsafe_target_versions() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    let pack = uploaded(&h, pack_zip(15)).await;

    for bad in ["", "latest", "../../etc", "1.20/evil"] {
        let err = h.orchestrator.create_job(pack.id, bad).await.unwrap_err();
        assert_matches!(err, PipelineError::Core(CoreError::Validation(_)), "{bad}");
    }
}

#[tokio::test]
async fn converted_packs_cannot_be_conversion_sources() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    let pack = uploaded(&h, pack_zip(15)).await;
    let job = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();
    h.orchestrator.run_conversion(job.id).await.unwrap();
    let converted = h.service.list_conversions(pack.id).await.unwrap().remove(0);

    let err = h.orchestrator.create_job(converted.id, "1.20").await.unwrap_err();

    assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));
}

#[tokio::test]
async fn duplicate_guard_rejects_active_jobs_when_enabled() {
    let config = ConversionConfig {
        reject_duplicate_active: true,
        ..ConversionConfig::default()
    };
    let h = Harness::with_config(StubBehaviour::Succeed, config).await;
    let pack = uploaded(&h, pack_zip(15)).await;

    let first = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();
    let err = h.orchestrator.create_job(pack.id, "1.21").await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Conflict(_)));

    // Other targets and finished jobs do not block.
    h.orchestrator.create_job(pack.id, "1.20").await.unwrap();
    h.orchestrator.run_conversion(first.id).await.unwrap();
    h.orchestrator.create_job(pack.id, "1.21").await.unwrap();
}

#[tokio::test]
async fn duplicate_jobs_are_allowed_by_default() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    let pack = uploaded(&h, pack_zip(15)).await;

    let a = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();
    let b = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();
    h.orchestrator.run_conversion(a.id).await.unwrap();
    h.orchestrator.run_conversion(b.id).await.unwrap();

    let conversions = h.service.list_conversions(pack.id).await.unwrap();
    assert_eq!(conversions.len(), 2);
    assert_ne!(conversions[0].storage_filename, conversions[1].storage_filename);
}

// ---------------------------------------------------------------------------
// run_conversion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_conversion_creates_one_derived_pack() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    let bytes = pack_zip(15);
    let pack = uploaded(&h, bytes.clone()).await;
    let job = h.orchestrator.create_job(pack.id, "1.20").await.unwrap();

    let done = h.orchestrator.run_conversion(job.id).await.unwrap();

    assert_eq!(done.status, ConversionStatus::Completed);
    assert!(done.completed_at.is_some());
    assert_eq!(done.error_message, None);
    assert!(done.console_log.as_deref().unwrap().contains("Converting from"));

    let conversions = h.service.list_conversions(pack.id).await.unwrap();
    assert_eq!(conversions.len(), 1);
    let converted = &conversions[0];
    assert!(converted.is_converted);
    assert_eq!(converted.original_pack_id, Some(pack.id));
    assert_eq!(converted.target_version.as_deref(), Some("1.20"));
    assert_eq!(converted.original_filename, "Cool Pack.zip");
    assert_eq!(converted.pack_format, Some(15));
    assert!(converted
        .storage_filename
        .starts_with(&format!("{}/1.20/Cool_Pack_to_1.20-", pack.id)));
    assert!(converted.storage_filename.ends_with(".zip"));

    let stored = std::fs::read(h.store.path_of(&converted.storage_filename)).unwrap();
    assert_eq!(converted.file_hash, sha256_hex(&stored));
    assert_eq!(converted.size_bytes, stored.len() as i64);
    assert_eq!(stored, bytes);
}

#[tokio::test]
async fn status_moves_through_every_state_in_order() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    let pack = uploaded(&h, pack_zip(15)).await;
    let job = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();

    h.orchestrator.run_conversion(job.id).await.unwrap();

    assert_eq!(
        h.jobs.statuses(),
        vec![
            ConversionStatus::Pending,
            ConversionStatus::InProgress,
            ConversionStatus::Completed,
        ]
    );
}

#[tokio::test]
async fn converter_failure_marks_job_failed_and_keeps_output() {
    let h = Harness::new(StubBehaviour::Fail).await;
    let pack = uploaded(&h, pack_zip(15)).await;
    let job = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();

    let done = h.orchestrator.run_conversion(job.id).await.unwrap();

    assert_eq!(done.status, ConversionStatus::Failed);
    assert!(done.completed_at.is_some());
    assert!(done
        .error_message
        .as_deref()
        .unwrap()
        .contains("Unsupported texture layout"));
    assert!(done
        .console_log
        .as_deref()
        .unwrap()
        .contains("Unsupported texture layout"));
    assert!(h.service.list_conversions(pack.id).await.unwrap().is_empty());
    assert_eq!(
        h.jobs.statuses(),
        vec![
            ConversionStatus::Pending,
            ConversionStatus::InProgress,
            ConversionStatus::Failed,
        ]
    );
}

#[tokio::test]
async fn missing_artifact_fails_the_job() {
    let h = Harness::new(StubBehaviour::ProduceNothing).await;
    let pack = uploaded(&h, pack_zip(15)).await;
    let job = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();

    let done = h.orchestrator.run_conversion(job.id).await.unwrap();

    assert_eq!(done.status, ConversionStatus::Failed);
    assert!(done
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("Converted file not found"));
    assert!(h.service.list_conversions(pack.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleted_source_fails_the_job() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    let pack = uploaded(&h, pack_zip(15)).await;
    let job = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();
    h.service.delete(pack.id).await.unwrap();

    let done = h.orchestrator.run_conversion(job.id).await.unwrap();

    assert_eq!(done.status, ConversionStatus::Failed);
    assert!(h.converter.requests().is_empty());
}

#[tokio::test]
async fn source_deleted_mid_run_fails_without_orphan_record() {
    let h = Harness::new(StubBehaviour::DeleteThenSucceed(1)).await;
    let pack = uploaded(&h, pack_zip(15)).await;
    assert_eq!(pack.id, 1);
    let job = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();

    let done = h.orchestrator.run_conversion(job.id).await.unwrap();

    assert_eq!(done.status, ConversionStatus::Failed);
    assert!(done
        .error_message
        .as_deref()
        .unwrap()
        .contains("original pack 1 does not exist"));
    assert!(h.service.list_all().await.unwrap().is_empty());
    assert!(!h.root().join("1").exists());
}

#[tokio::test]
async fn source_lookup_failure_is_reported_as_such() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    let pack = uploaded(&h, pack_zip(15)).await;
    let job = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();
    h.packs.fail_lookups();

    let done = h.orchestrator.run_conversion(job.id).await.unwrap();

    assert_eq!(done.status, ConversionStatus::Failed);
    let message = done.error_message.unwrap();
    assert!(message.starts_with("Failed to load source pack 1"), "{message}");
    assert!(!message.contains("record"), "{message}");
    assert!(h.converter.requests().is_empty());
}

#[tokio::test]
async fn source_version_comes_from_pack_metadata() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    let pack = uploaded(&h, pack_zip(15)).await;
    let job = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();

    h.orchestrator.run_conversion(job.id).await.unwrap();

    let requests = h.converter.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].source_version, "1.20");
    assert_eq!(requests[0].target_version, "1.21");
}

#[tokio::test]
async fn source_version_defaults_without_metadata() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    let pack = uploaded(&h, pack_zip_without_format()).await;
    assert_eq!(pack.human_version_range, None);
    let job = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();

    h.orchestrator.run_conversion(job.id).await.unwrap();

    assert_eq!(h.converter.requests()[0].source_version, "1.19");
}

#[tokio::test]
async fn source_version_defaults_for_unknown_format() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    let pack = uploaded(&h, pack_zip(999)).await;
    let job = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();

    h.orchestrator.run_conversion(job.id).await.unwrap();

    assert_eq!(h.converter.requests()[0].source_version, "1.19");
}

#[tokio::test]
async fn terminal_jobs_cannot_be_rerun() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    let pack = uploaded(&h, pack_zip(15)).await;
    let job = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();
    h.orchestrator.run_conversion(job.id).await.unwrap();

    let err = h.orchestrator.run_conversion(job.id).await.unwrap_err();

    assert_matches!(err, PipelineError::Core(CoreError::Conflict(_)));
    assert_eq!(h.service.list_conversions(pack.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    assert_matches!(
        h.orchestrator.run_conversion(5).await,
        Err(PipelineError::Core(CoreError::NotFound { entity: "ConversionJob", id: 5 }))
    );
}

#[tokio::test]
async fn spawned_conversion_completes_in_background() {
    let h = Harness::new(StubBehaviour::Succeed).await;
    let pack = uploaded(&h, pack_zip(15)).await;
    let job = h.orchestrator.create_job(pack.id, "1.21").await.unwrap();

    h.orchestrator.spawn_conversion(job.id).await.unwrap();

    let done = h.orchestrator.get_job(job.id).await.unwrap();
    assert_eq!(done.status, ConversionStatus::Completed);
    assert_eq!(h.orchestrator.jobs_for_pack(pack.id).await.unwrap(), vec![done]);
}
