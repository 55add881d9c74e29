use crate::{
    AspectRatio, ClipReference, CompletedMergeSnapshot, CreditPackage, GenerationOutcome, JobId,
    Language, MergeOutcomeView, MergeStage, MoveDirection,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Sign-in completed; the session store already holds the token.
    SignedIn {
        username: String,
        email: String,
        tokens: u32,
    },
    /// User signed out; all account-scoped state is discarded.
    SignedOut,
    /// Fresh token balance from the service.
    BalanceLoaded(u32),
    /// Project history listing arrived; replaces the current clip list.
    HistoryLoaded(Vec<ClipReference>),
    /// Restore previously completed merges from persisted state.
    RestoreCompletedMerges(Vec<CompletedMergeSnapshot>),
    /// User submitted a generation request.
    GenerateSubmitted {
        prompt: String,
        aspect_ratio: AspectRatio,
        language: Language,
        image_url: Option<String>,
    },
    /// Generation request finished.
    GenerateFinished {
        result: Result<GenerationOutcome, String>,
    },
    /// User asked to recharge credits.
    RechargeClicked,
    /// Credit packages arrived.
    PackagesLoaded(Vec<CreditPackage>),
    /// User picked a package to buy.
    PackageChosen { package_id: String },
    /// The payment service produced an external checkout URL.
    CheckoutReady { url: String },
    /// User entered merge mode; resets the selection.
    MergeModeEntered,
    /// User toggled a clip in or out of the selection.
    ClipToggled(ClipReference),
    /// User moved a selected clip up or down.
    ClipMoved {
        index: usize,
        direction: MoveDirection,
    },
    /// User removed a selected clip.
    ClipRemoved { index: usize },
    /// User left merge mode without merging.
    SelectionCancelled,
    /// User confirmed the merge.
    MergeConfirmed,
    /// Engine progress for the active merge job.
    MergeProgress {
        job_id: JobId,
        stage: MergeStage,
        percent: u8,
    },
    /// Engine completion for a merge job.
    MergeFinished {
        job_id: JobId,
        result: Result<MergeOutcomeView, String>,
    },
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
