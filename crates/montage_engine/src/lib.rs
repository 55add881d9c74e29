//! Montage engine: IO pipeline and merge execution.
mod api;
mod engine;
mod fetch;
mod filename;
mod loader;
mod media;
mod merge;
mod persist;
mod publish;
mod session;
mod types;
mod vfs;

pub use api::{
    ApiError, GenerateRequest, GenerationResult, HistoryEntry, PackageInfo, ServiceClient,
    UserProfile,
};
pub use engine::{EngineConfig, EngineHandle};
pub use fetch::{ClipFetcher, FetchSettings, ReqwestClipFetcher};
pub use filename::merged_filename;
pub use loader::{EngineAssets, EngineCell, EngineLoadError, EngineLoader, HttpEngineLoader};
pub use media::{concat_args, MediaEngine, StreamCopyEngine};
pub use merge::{concat_manifest, manifest_name, output_name, run_merge, staged_input_name};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use publish::{MergedSink, PublishOutcome, ResultPublisher, SinkError};
pub use session::{MemorySessionStore, SessionStore, TOKEN_KEY, USER_KEY};
pub use types::{
    ChannelProgressSink, EngineExecError, EngineFsError, ExecutionError, FetchError, FetchFailure,
    FetchedClip, JobId, MergeError, MergeEvent, MergeInput, MergeOutcome, MergeProgress,
    MergeRequest, MergeStage, ProgressSink,
};
pub use vfs::VirtualFs;
