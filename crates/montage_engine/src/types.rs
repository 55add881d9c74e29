use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;

use crate::loader::EngineLoadError;
use crate::persist::PersistError;

pub type JobId = u64;

/// Pipeline stage of a merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStage {
    Queued,
    EngineLoading,
    Staging,
    Concatenating,
    Publishing,
    Done,
}

/// One clip to be staged, in selection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeInput {
    pub clip_id: String,
    pub source_url: String,
}

/// A finalized merge order handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub job_id: JobId,
    pub inputs: Vec<MergeInput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeProgress {
    pub job_id: JobId,
    pub stage: MergeStage,
    /// Concatenation progress, 0..=100. Zero until the exec step starts;
    /// never decreases within one attempt.
    pub percent: u8,
}

#[derive(Debug)]
pub enum MergeEvent {
    Progress(MergeProgress),
    Completed {
        job_id: JobId,
        result: Result<MergeOutcome, MergeError>,
    },
}

/// The result of a successful merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Durable URL when the upload succeeded, local path otherwise.
    pub result_url: String,
    pub persisted: bool,
    pub local_path: PathBuf,
    pub byte_len: u64,
}

/// Raw clip bytes as fetched from the clip byte source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedClip {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchFailure,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FetchFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Network,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::InvalidUrl => write!(f, "invalid url"),
            FetchFailure::HttpStatus(code) => write!(f, "http status {code}"),
            FetchFailure::Timeout => write!(f, "timeout"),
            FetchFailure::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FetchFailure::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FetchFailure::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FetchFailure::Network => write!(f, "network error"),
        }
    }
}

/// Failure inside the engine's virtual filesystem.
#[derive(Debug, thiserror::Error)]
pub enum EngineFsError {
    #[error("no such file in engine filesystem: {0}")]
    NotFound(String),
}

/// Failure of the engine's exec call.
#[derive(Debug, thiserror::Error)]
pub enum EngineExecError {
    #[error("unsupported engine command: {0}")]
    UnsupportedCommand(String),
    #[error("malformed manifest line: {0}")]
    BadManifest(String),
    #[error("manifest lists no inputs")]
    EmptyManifest,
    #[error("staged input missing: {0}")]
    MissingInput(String),
}

/// Any failure during staging, manifest writing, concatenation, or the
/// local result write. No partial output escapes when one of these fires.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to fetch clip {clip_id}: {source}")]
    ClipFetch {
        clip_id: String,
        source: FetchError,
    },
    #[error("engine filesystem error: {0}")]
    EngineFs(#[from] EngineFsError),
    #[error("concatenation failed: {0}")]
    Exec(#[from] EngineExecError),
    #[error("failed to write local result: {0}")]
    LocalWrite(#[from] PersistError),
}

/// Top-level merge failure taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Caller-side validation failure; no network or engine call was made.
    #[error("merge needs at least two clips, got {0}")]
    InvalidSelection(usize),
    /// The engine could not be initialized; a later attempt retries.
    #[error("engine failed to load: {0}")]
    EngineLoad(#[from] EngineLoadError),
    /// Terminal failure of this attempt; the user may re-select and retry.
    #[error("merge execution failed: {0}")]
    Execution(#[from] ExecutionError),
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: MergeEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<MergeEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<MergeEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: MergeEvent) {
        let _ = self.tx.send(event);
    }
}
