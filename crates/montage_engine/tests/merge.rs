use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use montage_engine::{
    concat_args, concat_manifest, run_merge, EngineAssets, EngineCell, EngineExecError,
    EngineLoader, FetchSettings, HttpEngineLoader, MediaEngine, MergeError, MergeEvent,
    MergeInput, MergeRequest, MergeStage, MergedSink, ProgressSink, ReqwestClipFetcher,
    ResultPublisher, SinkError, StreamCopyEngine, VirtualFs,
};

/// Synthetic fixed-rate clips: every frame is FRAME_BYTES long, FPS frames
/// per second, so playable duration is a pure function of byte length and
/// stream-copy concatenation must be duration-additive.
const FRAME_BYTES: usize = 250;
const FPS: usize = 25;

fn fixture_clip(tag: u8, seconds: usize) -> Vec<u8> {
    vec![tag; seconds * FPS * FRAME_BYTES]
}

fn duration_secs(byte_len: usize) -> usize {
    byte_len / (FPS * FRAME_BYTES)
}

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<MergeEvent>>>,
}

impl TestSink {
    fn new() -> Self {
        Self::default()
    }

    fn percents(&self) -> Vec<u8> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                MergeEvent::Progress(progress)
                    if progress.stage == MergeStage::Concatenating =>
                {
                    Some(progress.percent)
                }
                _ => None,
            })
            .collect()
    }

    fn stages(&self) -> Vec<MergeStage> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                MergeEvent::Progress(progress) => Some(progress.stage),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: MergeEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Sink standing in for an unreachable persistence endpoint.
struct RejectingSink;

#[async_trait::async_trait]
impl MergedSink for RejectingSink {
    async fn store(&self, _filename: &str, _bytes: Bytes) -> Result<String, SinkError> {
        Err(SinkError::HttpStatus(500))
    }
}

struct AcceptingSink;

#[async_trait::async_trait]
impl MergedSink for AcceptingSink {
    async fn store(&self, filename: &str, _bytes: Bytes) -> Result<String, SinkError> {
        Ok(format!("https://cdn.example.com/merged/{filename}"))
    }
}

/// Loader handing out a pre-built engine, keeping its filesystem visible
/// to the test.
struct FixedLoader {
    engine: Arc<StreamCopyEngine>,
}

impl FixedLoader {
    fn new() -> (Self, VirtualFs) {
        let engine = Arc::new(StreamCopyEngine::new(EngineAssets {
            runtime: Bytes::new(),
            payload: Bytes::new(),
        }));
        let vfs = engine.vfs().clone();
        (Self { engine }, vfs)
    }
}

#[async_trait::async_trait]
impl EngineLoader for FixedLoader {
    async fn load(
        &self,
    ) -> Result<Arc<dyn MediaEngine>, montage_engine::EngineLoadError> {
        Ok(self.engine.clone())
    }
}

async fn mount_engine_assets(server: &MockServer) {
    for asset in ["engine-core.js", "engine-core.wasm"] {
        Mock::given(method("GET"))
            .and(path(format!("/engine/{asset}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"engine blob".to_vec(), "application/octet-stream"),
            )
            .mount(server)
            .await;
    }
}

async fn mount_clip(server: &MockServer, id: &str, body: Vec<u8>, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(format!("/clips/{id}.mp4")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(delay)
                .set_body_raw(body, "video/mp4"),
        )
        .mount(server)
        .await;
}

fn request_for(server: &MockServer, job_id: u64, ids: &[&str]) -> MergeRequest {
    MergeRequest {
        job_id,
        inputs: ids
            .iter()
            .map(|id| MergeInput {
                clip_id: id.to_string(),
                source_url: format!("{}/clips/{id}.mp4", server.uri()),
            })
            .collect(),
    }
}

#[test]
fn manifest_lists_inputs_in_order() {
    let names = vec!["job1-input0.mp4".to_string(), "job1-input1.mp4".to_string()];
    assert_eq!(
        concat_manifest(&names),
        "file 'job1-input0.mp4'\nfile 'job1-input1.mp4'\n"
    );
}

#[tokio::test]
async fn invalid_selection_makes_no_network_or_engine_calls() {
    let server = MockServer::start().await;
    let fetcher = ReqwestClipFetcher::new(FetchSettings::default());
    let loader = HttpEngineLoader::new(format!("{}/engine", server.uri()));
    let cell = EngineCell::new();
    let out_dir = TempDir::new().unwrap();
    let publisher = ResultPublisher::new(out_dir.path().to_path_buf());
    let sink = TestSink::new();

    let request = request_for(&server, 1, &["a"]);
    let err = run_merge(
        &request,
        &fetcher,
        &cell,
        &loader,
        &publisher,
        &RejectingSink,
        &sink,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, MergeError::InvalidSelection(1)));
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(!cell.is_loaded().await);
    assert!(sink.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn staging_order_matches_selection_despite_slow_middle_clip() {
    let server = MockServer::start().await;
    mount_engine_assets(&server).await;
    // The middle clip answers 5x slower than its neighbors; selection
    // order must still win over completion order.
    mount_clip(&server, "a", fixture_clip(1, 1), Duration::from_millis(50)).await;
    mount_clip(&server, "b", fixture_clip(2, 1), Duration::from_millis(250)).await;
    mount_clip(&server, "c", fixture_clip(3, 1), Duration::from_millis(50)).await;

    let fetcher = ReqwestClipFetcher::new(FetchSettings::default());
    let loader = HttpEngineLoader::new(format!("{}/engine", server.uri()));
    let cell = EngineCell::new();
    let out_dir = TempDir::new().unwrap();
    let publisher = ResultPublisher::new(out_dir.path().to_path_buf());
    let sink = TestSink::new();

    let request = request_for(&server, 2, &["a", "b", "c"]);
    let outcome = run_merge(
        &request,
        &fetcher,
        &cell,
        &loader,
        &publisher,
        &RejectingSink,
        &sink,
    )
    .await
    .expect("merge ok");

    let mut expected = fixture_clip(1, 1);
    expected.extend(fixture_clip(2, 1));
    expected.extend(fixture_clip(3, 1));
    let written = std::fs::read(&outcome.local_path).unwrap();
    assert_eq!(written, expected);
}

#[tokio::test]
async fn progress_is_monotone_and_bounded() {
    let server = MockServer::start().await;
    mount_engine_assets(&server).await;
    mount_clip(&server, "a", fixture_clip(1, 2), Duration::ZERO).await;
    mount_clip(&server, "b", fixture_clip(2, 1), Duration::ZERO).await;
    mount_clip(&server, "c", fixture_clip(3, 3), Duration::ZERO).await;

    let fetcher = ReqwestClipFetcher::new(FetchSettings::default());
    let loader = HttpEngineLoader::new(format!("{}/engine", server.uri()));
    let cell = EngineCell::new();
    let out_dir = TempDir::new().unwrap();
    let publisher = ResultPublisher::new(out_dir.path().to_path_buf());
    let sink = TestSink::new();

    let request = request_for(&server, 3, &["a", "b", "c"]);
    run_merge(
        &request,
        &fetcher,
        &cell,
        &loader,
        &publisher,
        &RejectingSink,
        &sink,
    )
    .await
    .expect("merge ok");

    let percents = sink.percents();
    assert!(!percents.is_empty());
    assert!(percents.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(percents.iter().all(|p| *p <= 100));

    let stages = sink.stages();
    assert_eq!(stages.first(), Some(&MergeStage::EngineLoading));
    assert_eq!(stages.last(), Some(&MergeStage::Done));
}

#[tokio::test]
async fn stream_copy_is_duration_additive() {
    let server = MockServer::start().await;
    mount_engine_assets(&server).await;
    mount_clip(&server, "a", fixture_clip(1, 8), Duration::ZERO).await;
    mount_clip(&server, "b", fixture_clip(2, 8), Duration::ZERO).await;
    mount_clip(&server, "c", fixture_clip(3, 8), Duration::ZERO).await;

    let fetcher = ReqwestClipFetcher::new(FetchSettings::default());
    let loader = HttpEngineLoader::new(format!("{}/engine", server.uri()));
    let cell = EngineCell::new();
    let out_dir = TempDir::new().unwrap();
    let publisher = ResultPublisher::new(out_dir.path().to_path_buf());
    let sink = TestSink::new();

    let request = request_for(&server, 4, &["a", "b", "c"]);
    let outcome = run_merge(
        &request,
        &fetcher,
        &cell,
        &loader,
        &publisher,
        &RejectingSink,
        &sink,
    )
    .await
    .expect("merge ok");

    assert_eq!(duration_secs(outcome.byte_len as usize), 24);
}

#[tokio::test]
async fn engine_load_failure_leaves_cell_empty_and_retry_succeeds() {
    let server = MockServer::start().await;
    mount_clip(&server, "a", fixture_clip(1, 1), Duration::ZERO).await;
    mount_clip(&server, "b", fixture_clip(2, 1), Duration::ZERO).await;

    let fetcher = ReqwestClipFetcher::new(FetchSettings::default());
    let loader = HttpEngineLoader::new(format!("{}/engine", server.uri()));
    let cell = EngineCell::new();
    let out_dir = TempDir::new().unwrap();
    let publisher = ResultPublisher::new(out_dir.path().to_path_buf());
    let sink = TestSink::new();

    // No asset mocks yet: the load fails and the cell stays empty.
    let request = request_for(&server, 5, &["a", "b"]);
    let err = run_merge(
        &request,
        &fetcher,
        &cell,
        &loader,
        &publisher,
        &RejectingSink,
        &sink,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MergeError::EngineLoad(_)));
    assert!(!cell.is_loaded().await);

    // The next attempt refetches the assets and goes through.
    mount_engine_assets(&server).await;
    run_merge(
        &request,
        &fetcher,
        &cell,
        &loader,
        &publisher,
        &RejectingSink,
        &sink,
    )
    .await
    .expect("retry ok");
    assert!(cell.is_loaded().await);
}

#[tokio::test]
async fn failed_staging_is_an_execution_error_and_leaves_vfs_clean() {
    let server = MockServer::start().await;
    mount_clip(&server, "a", fixture_clip(1, 1), Duration::ZERO).await;
    // Clip "b" is never mounted, so its fetch 404s mid-staging.

    let fetcher = ReqwestClipFetcher::new(FetchSettings::default());
    let (loader, vfs) = FixedLoader::new();
    let cell = EngineCell::new();
    let out_dir = TempDir::new().unwrap();
    let publisher = ResultPublisher::new(out_dir.path().to_path_buf());
    let sink = TestSink::new();

    let request = request_for(&server, 6, &["a", "b"]);
    let err = run_merge(
        &request,
        &fetcher,
        &cell,
        &loader,
        &publisher,
        &RejectingSink,
        &sink,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, MergeError::Execution(_)));
    // A failed attempt never leaves staged files behind for the next one.
    assert_eq!(vfs.file_count(), 0);
    // And no partial output reached the output directory.
    assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn successful_merge_cleans_staged_files() {
    let server = MockServer::start().await;
    mount_clip(&server, "a", fixture_clip(1, 1), Duration::ZERO).await;
    mount_clip(&server, "b", fixture_clip(2, 1), Duration::ZERO).await;

    let fetcher = ReqwestClipFetcher::new(FetchSettings::default());
    let (loader, vfs) = FixedLoader::new();
    let cell = EngineCell::new();
    let out_dir = TempDir::new().unwrap();
    let publisher = ResultPublisher::new(out_dir.path().to_path_buf());
    let sink = TestSink::new();

    let request = request_for(&server, 7, &["a", "b"]);
    run_merge(
        &request,
        &fetcher,
        &cell,
        &loader,
        &publisher,
        &RejectingSink,
        &sink,
    )
    .await
    .expect("merge ok");

    assert_eq!(vfs.file_count(), 0);
}

#[tokio::test]
async fn end_to_end_merge_with_persistence() {
    let server = MockServer::start().await;
    mount_engine_assets(&server).await;
    mount_clip(&server, "a", fixture_clip(1, 8), Duration::ZERO).await;
    mount_clip(&server, "b", fixture_clip(2, 8), Duration::ZERO).await;
    mount_clip(&server, "c", fixture_clip(3, 8), Duration::ZERO).await;

    let fetcher = ReqwestClipFetcher::new(FetchSettings::default());
    let loader = HttpEngineLoader::new(format!("{}/engine", server.uri()));
    let cell = EngineCell::new();
    let out_dir = TempDir::new().unwrap();
    let publisher = ResultPublisher::new(out_dir.path().to_path_buf());
    let sink = TestSink::new();

    let request = request_for(&server, 8, &["a", "b", "c"]);
    let outcome = run_merge(
        &request,
        &fetcher,
        &cell,
        &loader,
        &publisher,
        &AcceptingSink,
        &sink,
    )
    .await
    .expect("merge ok");

    assert!(outcome.persisted);
    assert!(outcome
        .result_url
        .starts_with("https://cdn.example.com/merged/"));
    assert_eq!(duration_secs(outcome.byte_len as usize), 24);
    assert!(outcome.local_path.exists());
}

#[tokio::test]
async fn engine_rejects_unknown_commands_and_bad_manifests() {
    let (loader, _vfs) = FixedLoader::new();
    let engine = loader.load().await.unwrap();
    let no_progress = |_: u8| {};

    let err = engine
        .exec(&["-version".to_string()], &no_progress)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineExecError::UnsupportedCommand(_)));

    engine
        .write_file("list.txt", Bytes::from_static(b"input0.mp4\n"))
        .unwrap();
    let err = engine
        .exec(&concat_args("list.txt", "out.mp4"), &no_progress)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineExecError::BadManifest(_)));

    engine
        .write_file("empty.txt", Bytes::from_static(b"\n"))
        .unwrap();
    let err = engine
        .exec(&concat_args("empty.txt", "out.mp4"), &no_progress)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineExecError::EmptyManifest));

    engine
        .write_file("dangling.txt", Bytes::from_static(b"file 'ghost.mp4'\n"))
        .unwrap();
    let err = engine
        .exec(&concat_args("dangling.txt", "out.mp4"), &no_progress)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineExecError::MissingInput(_)));
}
