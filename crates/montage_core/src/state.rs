use crate::view_model::{AppViewModel, SelectionRowView};
use crate::{ClipReference, MergeSelection};

pub type JobId = u64;

/// Where the user is in the merge flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeFlow {
    /// Browsing history; no selection in progress.
    #[default]
    Browsing,
    /// Picking and ordering clips for a merge.
    Selecting,
    /// A merge job is executing.
    Running,
}

/// Signed-in user snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub email: String,
    pub tokens: u32,
}

/// Output format of a generated video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    Landscape,
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Fr,
    En,
    Es,
}

/// Pipeline stage of a running merge, as surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStage {
    Queued,
    EngineLoading,
    Staging,
    Concatenating,
    Publishing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeJobStatus {
    Pending,
    Running,
    Succeeded { result_url: String, persisted: bool },
    Failed { reason: String },
}

/// One merge execution attempt as seen by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeJobView {
    pub job_id: JobId,
    pub status: MergeJobStatus,
    pub stage: MergeStage,
    pub percent: u8,
}

/// Result payload of a finished merge, delivered by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcomeView {
    pub result_url: String,
    pub persisted: bool,
}

/// Result payload of a finished generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub video_url: String,
    pub tokens_remaining: Option<u32>,
}

/// Persisted record of a finished merge, restorable at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedMergeSnapshot {
    pub result_url: String,
    pub persisted: bool,
    pub clip_count: usize,
}

/// A purchasable credit package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditPackage {
    pub id: String,
    pub name: String,
    pub price_cents: u32,
    pub tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    account: Option<Account>,
    history: Vec<ClipReference>,
    flow: MergeFlow,
    selection: MergeSelection,
    active_job: Option<MergeJobView>,
    completed_merges: Vec<CompletedMergeSnapshot>,
    generating: bool,
    last_generated_url: Option<String>,
    packages: Vec<CreditPackage>,
    last_error: Option<String>,
    next_job_id: JobId,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn flow(&self) -> MergeFlow {
        self.flow
    }

    pub fn history(&self) -> &[ClipReference] {
        &self.history
    }

    pub fn selection(&self) -> &MergeSelection {
        &self.selection
    }

    pub fn active_job(&self) -> Option<&MergeJobView> {
        self.active_job.as_ref()
    }

    pub fn completed_merges(&self) -> &[CompletedMergeSnapshot] {
        &self.completed_merges
    }

    /// True while a merge job is executing. Used as the in-flight guard:
    /// a second merge may not start until the active one reaches a
    /// terminal status.
    pub fn merge_in_flight(&self) -> bool {
        matches!(
            self.active_job,
            Some(MergeJobView {
                status: MergeJobStatus::Pending | MergeJobStatus::Running,
                ..
            })
        )
    }

    /// Returns whether the state changed since the last call, clearing
    /// the flag. The shell uses this to coalesce rendering.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            signed_in_as: self.account.as_ref().map(|a| a.username.clone()),
            token_balance: self.account.as_ref().map(|a| a.tokens),
            flow: self.flow,
            history_count: self.history.len(),
            selection: self
                .selection
                .clips()
                .iter()
                .enumerate()
                .map(|(position, clip)| SelectionRowView {
                    position,
                    clip_id: clip.id.clone(),
                    prompt: clip.prompt.clone(),
                })
                .collect(),
            can_merge: self.selection.can_merge(),
            active_job: self.active_job.clone(),
            completed_merges: self.completed_merges.len(),
            generating: self.generating,
            last_generated_url: self.last_generated_url.clone(),
            packages: self.packages.clone(),
            last_error: self.last_error.clone(),
            dirty: self.dirty,
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_account(&mut self, account: Option<Account>) {
        self.account = account;
    }

    pub(crate) fn set_tokens(&mut self, tokens: u32) {
        if let Some(account) = self.account.as_mut() {
            account.tokens = tokens;
        }
    }

    pub(crate) fn set_history(&mut self, history: Vec<ClipReference>) {
        self.history = history;
    }

    pub(crate) fn set_flow(&mut self, flow: MergeFlow) {
        self.flow = flow;
    }

    pub(crate) fn selection_mut(&mut self) -> &mut MergeSelection {
        &mut self.selection
    }

    pub(crate) fn set_active_job(&mut self, job: Option<MergeJobView>) {
        self.active_job = job;
    }

    pub(crate) fn active_job_mut(&mut self) -> Option<&mut MergeJobView> {
        self.active_job.as_mut()
    }

    pub(crate) fn push_completed_merge(&mut self, snapshot: CompletedMergeSnapshot) {
        self.completed_merges.push(snapshot);
    }

    pub(crate) fn set_completed_merges(&mut self, snapshots: Vec<CompletedMergeSnapshot>) {
        self.completed_merges = snapshots;
    }

    pub fn generating(&self) -> bool {
        self.generating
    }

    pub(crate) fn set_generating(&mut self, generating: bool) {
        self.generating = generating;
    }

    pub(crate) fn set_last_generated_url(&mut self, url: Option<String>) {
        self.last_generated_url = url;
    }

    pub(crate) fn set_packages(&mut self, packages: Vec<CreditPackage>) {
        self.packages = packages;
    }

    pub(crate) fn packages(&self) -> &[CreditPackage] {
        &self.packages
    }

    pub(crate) fn set_last_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    pub(crate) fn allocate_job_id(&mut self) -> JobId {
        self.next_job_id += 1;
        self.next_job_id
    }

    pub(crate) fn job_counter(&self) -> JobId {
        self.next_job_id
    }

    pub(crate) fn set_job_counter(&mut self, counter: JobId) {
        self.next_job_id = counter;
    }
}
