//! Montage core: pure state machine and view-model helpers.
mod clip;
mod effect;
mod msg;
mod selection;
mod state;
mod update;
mod view_model;

pub use clip::ClipReference;
pub use effect::Effect;
pub use msg::Msg;
pub use selection::{MergeSelection, MoveDirection, MIN_MERGE_CLIPS};
pub use state::{
    Account, AppState, AspectRatio, CompletedMergeSnapshot, CreditPackage, GenerationOutcome,
    JobId, Language, MergeFlow, MergeJobStatus, MergeJobView, MergeOutcomeView, MergeStage,
};
pub use update::{prompt_word_count, update};
pub use view_model::{AppViewModel, SelectionRowView, PROMPT_WORD_LIMIT, VIDEO_TOKEN_COST};
