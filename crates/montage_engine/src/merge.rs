use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use engine_logging::{engine_debug, engine_info};

use crate::fetch::ClipFetcher;
use crate::loader::{EngineCell, EngineLoader};
use crate::media::{concat_args, MediaEngine};
use crate::publish::{MergedSink, ResultPublisher};
use crate::{
    ExecutionError, JobId, MergeError, MergeEvent, MergeOutcome, MergeProgress, MergeRequest,
    MergeStage, ProgressSink,
};

const MIN_MERGE_CLIPS: usize = 2;

/// Staged name of the clip at `index`. Names carry the job id so a
/// failed prior attempt can never collide with a retry.
pub fn staged_input_name(job_id: JobId, index: usize) -> String {
    format!("job{job_id}-input{index}.mp4")
}

pub fn manifest_name(job_id: JobId) -> String {
    format!("job{job_id}-list.txt")
}

pub fn output_name(job_id: JobId) -> String {
    format!("job{job_id}-output.mp4")
}

/// Concat-demuxer manifest: one `file '<name>'` line per input, in
/// selection order. The engine concatenates in manifest order.
pub fn concat_manifest(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("file '{name}'\n"))
        .collect()
}

/// Executes one merge attempt end to end.
///
/// Selection order is concatenation order: each clip is fetched and
/// staged before the next fetch starts. Nothing is fetched, loaded, or
/// staged for an invalid selection.
pub async fn run_merge(
    request: &MergeRequest,
    fetcher: &dyn ClipFetcher,
    cell: &EngineCell,
    loader: &dyn EngineLoader,
    publisher: &ResultPublisher,
    sink: &dyn MergedSink,
    events: &dyn ProgressSink,
) -> Result<MergeOutcome, MergeError> {
    let job_id = request.job_id;
    if request.inputs.len() < MIN_MERGE_CLIPS {
        return Err(MergeError::InvalidSelection(request.inputs.len()));
    }

    emit(events, job_id, MergeStage::EngineLoading, 0);
    let engine = cell.ensure_loaded(loader).await?;

    let result = stage_and_concat(&engine, request, fetcher, publisher, sink, events).await;

    // Staged inputs, manifest and output never outlive the attempt, so a
    // failed run leaves nothing behind for the next one.
    for index in 0..request.inputs.len() {
        engine.remove_file(&staged_input_name(job_id, index));
    }
    engine.remove_file(&manifest_name(job_id));
    engine.remove_file(&output_name(job_id));

    result
}

async fn stage_and_concat(
    engine: &Arc<dyn MediaEngine>,
    request: &MergeRequest,
    fetcher: &dyn ClipFetcher,
    publisher: &ResultPublisher,
    sink: &dyn MergedSink,
    events: &dyn ProgressSink,
) -> Result<MergeOutcome, MergeError> {
    let job_id = request.job_id;

    let mut staged = Vec::with_capacity(request.inputs.len());
    for (index, input) in request.inputs.iter().enumerate() {
        emit(events, job_id, MergeStage::Staging, 0);
        let fetched = fetcher
            .fetch(&input.source_url)
            .await
            .map_err(|source| ExecutionError::ClipFetch {
                clip_id: input.clip_id.clone(),
                source,
            })?;
        let name = staged_input_name(job_id, index);
        engine
            .write_file(&name, fetched.bytes)
            .map_err(ExecutionError::from)?;
        engine_debug!(
            "merge {job_id}: staged clip {} as {name} ({} bytes)",
            input.clip_id,
            fetched.byte_len
        );
        staged.push(name);
    }

    let manifest = manifest_name(job_id);
    engine
        .write_file(&manifest, Bytes::from(concat_manifest(&staged)))
        .map_err(ExecutionError::from)?;

    let output = output_name(job_id);
    emit(events, job_id, MergeStage::Concatenating, 0);
    let last_percent = AtomicU8::new(0);
    let on_progress = |percent: u8| {
        // Clamped so the reported series stays monotone in 0..=100 even
        // if the engine misbehaves.
        let clamped = percent.min(100);
        let prev = last_percent.fetch_max(clamped, Ordering::Relaxed);
        emit(events, job_id, MergeStage::Concatenating, prev.max(clamped));
    };
    engine
        .exec(&concat_args(&manifest, &output), &on_progress)
        .await
        .map_err(ExecutionError::from)?;

    let merged = engine.read_file(&output).map_err(ExecutionError::from)?;
    let byte_len = merged.len() as u64;
    let reached = last_percent.load(Ordering::Relaxed);

    emit(events, job_id, MergeStage::Publishing, reached);
    let published = publisher
        .publish(job_id, &merged, sink)
        .await
        .map_err(ExecutionError::from)?;

    emit(events, job_id, MergeStage::Done, reached);
    engine_info!(
        "merge {job_id}: {} inputs, {byte_len} bytes, persisted={}",
        request.inputs.len(),
        published.persisted
    );
    Ok(MergeOutcome {
        result_url: published.playable_url,
        persisted: published.persisted,
        local_path: published.local_path,
        byte_len,
    })
}

fn emit(events: &dyn ProgressSink, job_id: JobId, stage: MergeStage, percent: u8) {
    events.emit(MergeEvent::Progress(MergeProgress {
        job_id,
        stage,
        percent,
    }));
}
