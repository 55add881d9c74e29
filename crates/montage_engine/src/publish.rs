use std::path::PathBuf;

use bytes::Bytes;

use engine_logging::{engine_info, engine_warn};

use crate::filename::merged_filename;
use crate::persist::{AtomicFileWriter, PersistError};
use crate::JobId;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("upload response carried no url")]
    MissingUrl,
    #[error("not signed in")]
    NotSignedIn,
}

/// The merged-clip persistence sink: accepts the merged bytes, returns a
/// durable URL on success.
#[async_trait::async_trait]
pub trait MergedSink: Send + Sync {
    async fn store(&self, filename: &str, bytes: Bytes) -> Result<String, SinkError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Durable URL when the upload succeeded, local path otherwise.
    /// Always playable.
    pub playable_url: String,
    pub persisted: bool,
    pub local_path: PathBuf,
}

/// Turns merged bytes into a playable result: a local file always, a
/// durable remote entry when the sink cooperates.
pub struct ResultPublisher {
    output_dir: PathBuf,
}

impl ResultPublisher {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Upload failure is a soft failure: it downgrades `persisted` and
    /// keeps the local path playable, but never errors. Only the local
    /// write can fail, since without it a failed upload would leave no
    /// result at all.
    pub async fn publish(
        &self,
        job_id: JobId,
        bytes: &Bytes,
        sink: &dyn MergedSink,
    ) -> Result<PublishOutcome, PersistError> {
        let filename = merged_filename(job_id, bytes);
        let writer = AtomicFileWriter::new(self.output_dir.clone());
        let local_path = writer.write_bytes(&filename, bytes)?;
        engine_info!(
            "merge {job_id}: wrote local result {:?} ({} bytes)",
            local_path,
            bytes.len()
        );

        match sink.store(&filename, bytes.clone()).await {
            Ok(durable_url) => {
                engine_info!("merge {job_id}: persisted as {durable_url}");
                Ok(PublishOutcome {
                    playable_url: durable_url,
                    persisted: true,
                    local_path,
                })
            }
            Err(err) => {
                engine_warn!("merge {job_id}: upload failed, keeping local result: {err}");
                Ok(PublishOutcome {
                    playable_url: local_path.display().to_string(),
                    persisted: false,
                    local_path,
                })
            }
        }
    }
}
