use crate::{CreditPackage, MergeFlow, MergeJobView};

/// Client-side word limit for generation prompts.
pub const PROMPT_WORD_LIMIT: usize = 300;

/// Tokens charged by the service per generated video.
pub const VIDEO_TOKEN_COST: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub signed_in_as: Option<String>,
    pub token_balance: Option<u32>,
    pub flow: MergeFlow,
    pub history_count: usize,
    pub selection: Vec<SelectionRowView>,
    pub can_merge: bool,
    pub active_job: Option<MergeJobView>,
    pub completed_merges: usize,
    pub generating: bool,
    pub last_generated_url: Option<String>,
    pub packages: Vec<CreditPackage>,
    pub last_error: Option<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRowView {
    pub position: usize,
    pub clip_id: String,
    pub prompt: String,
}
