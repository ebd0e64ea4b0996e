//! Ingestion pipeline tests against the in-process encoder.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{FakeEngine, TestHarness};
use trackwave::config::{CbrPolicy, Config};
use trackwave::ingest::IngestPipeline;
use trackwave::Error;
use trackwave_common::{ListenerId, TrackId};
use trackwave_db::models::{NewTrack, Track};
use trackwave_db::pool::init_memory_pool;
use trackwave_db::{MetadataStore, SqliteMetadataStore};
use trackwave_media::{parse_frames, SegmentManifest};

fn new_track(owner: &str) -> NewTrack {
    let mut new = NewTrack::new(owner.parse().unwrap(), "Test Artist", "Test Song");
    new.album_name = Some("Test Album".into());
    new.release_year = Some(2024);
    new
}

fn track_count(harness: &TestHarness, owner: &str) -> usize {
    let owner: ListenerId = owner.parse().unwrap();
    harness.store.list_tracks_by_owner(&owner).unwrap().len()
}

#[tokio::test]
async fn test_ingest_produces_artifacts() {
    let harness = TestHarness::new();
    let outcome = harness
        .state
        .ingest
        .submit(new_track("alice"), b"some mp3 bytes".to_vec().into())
        .await
        .unwrap();

    assert_eq!(outcome.segment_count, 10);
    assert_eq!(outcome.frames.frame_count, 431);
    assert_eq!(outcome.track.codec.as_deref(), Some("mp3"));
    assert_eq!(outcome.track.bitrate_kbps, Some(192));
    assert!(outcome.track.duration_secs.unwrap() > 9.9);

    let layout = &harness.state.layout;
    assert_eq!(
        outcome.dir,
        layout.track_dir(&outcome.track.owner, outcome.track.id)
    );
    assert!(outcome.dir.join("playlist.m3u8").is_file());
    assert!(outcome.dir.join("segment9.ts").is_file());

    let bitstream =
        std::fs::read(layout.bitstream_path(&outcome.track.owner, outcome.track.id)).unwrap();
    assert_eq!(parse_frames(&bitstream).unwrap().len(), 431);

    let manifest =
        SegmentManifest::parse(&std::fs::read_to_string(outcome.dir.join("playlist.m3u8")).unwrap())
            .unwrap();
    assert_eq!(manifest.segments.len(), 10);
    assert!(manifest.ended);

    let stored = harness.store.get_track(outcome.track.id).unwrap().unwrap();
    assert_eq!(stored.title, "Test Song");
    assert_eq!(stored.plays, 0);

    // Scratch space is cleaned up.
    let tmp = harness.state.config.storage.tmp_dir();
    let leftovers = std::fs::read_dir(&tmp).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_ingest_no_audio_creates_no_record() {
    let harness = TestHarness::new();
    let err = harness
        .state
        .ingest
        .submit(new_track("bob"), common::NO_AUDIO.to_vec().into())
        .await
        .unwrap_err();

    assert_matches!(err, Error::NoAudioStream(_));
    assert_eq!(track_count(&harness, "bob"), 0);
}

#[tokio::test]
async fn test_ingest_empty_upload_rejected() {
    let harness = TestHarness::new();
    let err = harness
        .state
        .ingest
        .submit(new_track("bob"), Vec::new().into())
        .await
        .unwrap_err();
    assert_matches!(err, Error::InvalidInput(_));
}

#[tokio::test]
async fn test_segment_failure_rolls_back() {
    let harness = TestHarness::new();
    let err = harness
        .state
        .ingest
        .submit(new_track("carol"), common::FAIL_SEGMENTS.to_vec().into())
        .await
        .unwrap_err();

    assert_matches!(err, Error::IngestionFailure(_));
    assert_eq!(track_count(&harness, "carol"), 0);
    assert!(!harness.state.layout.root().join("carol").exists());
}

#[tokio::test]
async fn test_bitstream_failure_rolls_back() {
    let harness = TestHarness::new();
    let err = harness
        .state
        .ingest
        .submit(new_track("carol"), common::FAIL_BITSTREAM.to_vec().into())
        .await
        .unwrap_err();

    assert_matches!(err, Error::IngestionFailure(ref msg) if msg.contains("encoder exited"));
    assert_eq!(track_count(&harness, "carol"), 0);
    assert!(!harness.state.layout.root().join("carol").exists());
}

#[tokio::test]
async fn test_garbage_bitstream_rolls_back() {
    let harness = TestHarness::new();
    let err = harness
        .state
        .ingest
        .submit(new_track("dave"), common::GARBAGE_BITSTREAM.to_vec().into())
        .await
        .unwrap_err();

    assert_matches!(err, Error::FrameSyncNotFound { scanned: 4096 });
    assert_eq!(track_count(&harness, "dave"), 0);
}

#[tokio::test]
async fn test_variable_bitrate_policy() {
    // Warn: accepted with a log line.
    let harness = TestHarness::new();
    harness
        .state
        .ingest
        .submit(new_track("erin"), common::VBR_BITSTREAM.to_vec().into())
        .await
        .unwrap();
    assert_eq!(track_count(&harness, "erin"), 1);

    // Reject: rolled back.
    let harness = TestHarness::with_config(|c| c.stream.cbr_policy = CbrPolicy::Reject);
    let err = harness
        .state
        .ingest
        .submit(new_track("erin"), common::VBR_BITSTREAM.to_vec().into())
        .await
        .unwrap_err();
    assert_matches!(err, Error::VariableBitrate(_));
    assert_eq!(track_count(&harness, "erin"), 0);
}

/// Store whose deletes always fail.
struct FailingStore(SqliteMetadataStore);

impl MetadataStore for FailingStore {
    fn create_track(&self, new: &NewTrack) -> trackwave_common::Result<Track> {
        self.0.create_track(new)
    }

    fn delete_track(&self, _id: TrackId) -> trackwave_common::Result<bool> {
        Err(trackwave_common::Error::database("database is locked"))
    }

    fn get_track(&self, id: TrackId) -> trackwave_common::Result<Option<Track>> {
        self.0.get_track(id)
    }
}

#[tokio::test]
async fn test_failed_rollback_reports_inconsistency() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_path_buf();

    let sqlite = SqliteMetadataStore::new(init_memory_pool().unwrap());
    let pipeline = IngestPipeline::new(
        &config,
        Arc::new(FailingStore(sqlite.clone())),
        Arc::new(FakeEngine::default()),
    );

    let err = pipeline
        .ingest(new_track("frank"), common::FAIL_BITSTREAM)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        Error::MetadataInconsistency(ref msg) if msg.contains("database is locked")
    );

    // The record really was left behind.
    let owner: ListenerId = "frank".parse().unwrap();
    assert_eq!(sqlite.list_tracks_by_owner(&owner).unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_removes_record_and_artifacts() {
    let harness = TestHarness::new();
    let outcome = harness
        .state
        .ingest
        .submit(new_track("gina"), b"audio".to_vec().into())
        .await
        .unwrap();
    assert!(outcome.dir.exists());

    let pipeline = harness.state.ingest.pipeline();
    let deleted = pipeline.delete(outcome.track.id).await.unwrap();
    assert_eq!(deleted.id, outcome.track.id);
    assert!(!outcome.dir.exists());
    assert!(harness.store.get_track(outcome.track.id).unwrap().is_none());

    let err = pipeline.delete(outcome.track.id).await.unwrap_err();
    assert_matches!(err, Error::NotFound(_));
}

#[tokio::test]
async fn test_concurrent_ingests_get_distinct_ids() {
    let harness = TestHarness::with_config(|c| c.ingest.max_concurrent_jobs = 2);

    let jobs = (0..6).map(|i| {
        let pool = harness.state.ingest.clone();
        async move {
            pool.submit(new_track("hank"), format!("upload {i}").into_bytes().into())
                .await
        }
    });
    let outcomes = futures::future::join_all(jobs).await;

    let mut ids: Vec<_> = outcomes.into_iter().map(|o| o.unwrap().track.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 6);
    assert_eq!(track_count(&harness, "hank"), 6);
    assert_eq!(harness.state.ingest.available(), 2);
}
