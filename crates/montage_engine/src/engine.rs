use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use engine_logging::engine_info;

use crate::api::ServiceClient;
use crate::fetch::{ClipFetcher, FetchSettings, ReqwestClipFetcher};
use crate::loader::{EngineCell, EngineLoader, HttpEngineLoader};
use crate::merge::run_merge;
use crate::publish::ResultPublisher;
use crate::{ChannelProgressSink, MergeEvent, MergeRequest};

#[derive(Clone)]
pub struct EngineConfig {
    pub fetch: FetchSettings,
    /// Base location the engine runtime and payload blobs are served from.
    pub engine_base_url: String,
    /// Directory for locally playable merge results.
    pub output_dir: PathBuf,
    pub service: ServiceClient,
}

enum EngineCommand {
    Merge(MergeRequest),
}

/// Facade over the merge pipeline: a background thread owning the tokio
/// runtime, fed by commands, answering with events.
///
/// The command loop blocks on each merge, so two confirmed merges run
/// strictly one after the other against the shared engine cell.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: Arc<Mutex<mpsc::Receiver<MergeEvent>>>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            let fetcher = ReqwestClipFetcher::new(config.fetch.clone());
            let loader = HttpEngineLoader::new(config.engine_base_url.clone());
            let cell = EngineCell::new();
            let publisher = ResultPublisher::new(config.output_dir.clone());
            while let Ok(command) = cmd_rx.recv() {
                runtime.block_on(handle_command(
                    command,
                    &fetcher,
                    &cell,
                    &loader,
                    &publisher,
                    &config.service,
                    &event_tx,
                ));
            }
        });

        Self {
            cmd_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        }
    }

    pub fn enqueue_merge(&self, request: MergeRequest) {
        let _ = self.cmd_tx.send(EngineCommand::Merge(request));
    }

    pub fn try_recv(&self) -> Option<MergeEvent> {
        self.event_rx.lock().ok()?.try_recv().ok()
    }
}

async fn handle_command(
    command: EngineCommand,
    fetcher: &dyn ClipFetcher,
    cell: &EngineCell,
    loader: &dyn EngineLoader,
    publisher: &ResultPublisher,
    service: &ServiceClient,
    event_tx: &mpsc::Sender<MergeEvent>,
) {
    match command {
        EngineCommand::Merge(request) => {
            let job_id = request.job_id;
            engine_info!("merge {job_id}: started with {} clips", request.inputs.len());
            let sink = ChannelProgressSink::new(event_tx.clone());
            let result = run_merge(
                &request, fetcher, cell, loader, publisher, service, &sink,
            )
            .await;
            let _ = event_tx.send(MergeEvent::Completed { job_id, result });
        }
    }
}
