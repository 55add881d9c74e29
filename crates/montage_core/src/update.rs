use crate::{
    Account, AppState, CompletedMergeSnapshot, Effect, MergeFlow, MergeJobStatus, MergeJobView,
    MergeStage, Msg, PROMPT_WORD_LIMIT,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::SignedIn {
            username,
            email,
            tokens,
        } => {
            state.set_account(Some(Account {
                username,
                email,
                tokens,
            }));
            state.mark_dirty();
            // The dashboard loads history and balance right after sign-in.
            vec![Effect::LoadHistory, Effect::LoadBalance]
        }
        Msg::SignedOut => {
            let mut next = AppState::new();
            next.set_completed_merges(state.completed_merges().to_vec());
            // Job ids keep counting up so a zombie completion from before
            // the sign-out can never match a fresh job.
            next.set_job_counter(state.job_counter());
            next.mark_dirty();
            state = next;
            Vec::new()
        }
        Msg::BalanceLoaded(tokens) => {
            state.set_tokens(tokens);
            state.mark_dirty();
            Vec::new()
        }
        Msg::HistoryLoaded(clips) => {
            state.set_history(clips);
            state.mark_dirty();
            Vec::new()
        }
        Msg::RestoreCompletedMerges(snapshots) => {
            state.set_completed_merges(snapshots);
            state.mark_dirty();
            Vec::new()
        }
        Msg::GenerateSubmitted {
            prompt,
            aspect_ratio,
            language,
            image_url,
        } => {
            if state.generating() {
                return (state, Vec::new());
            }
            if prompt_word_count(&prompt) > PROMPT_WORD_LIMIT {
                state.set_last_error(Some(format!(
                    "prompt exceeds the {PROMPT_WORD_LIMIT} word limit"
                )));
                state.mark_dirty();
                return (state, Vec::new());
            }
            state.set_generating(true);
            state.set_last_error(None);
            state.mark_dirty();
            vec![Effect::GenerateVideo {
                prompt,
                aspect_ratio,
                language,
                image_url,
            }]
        }
        Msg::GenerateFinished { result } => {
            state.set_generating(false);
            match result {
                Ok(outcome) => {
                    state.set_last_generated_url(Some(outcome.video_url));
                    if let Some(tokens) = outcome.tokens_remaining {
                        state.set_tokens(tokens);
                    }
                    state.mark_dirty();
                    // A fresh generation changes the history listing.
                    vec![Effect::LoadHistory]
                }
                Err(reason) => {
                    state.set_last_error(Some(reason));
                    state.mark_dirty();
                    Vec::new()
                }
            }
        }
        Msg::RechargeClicked => vec![Effect::LoadPackages],
        Msg::PackagesLoaded(packages) => {
            state.set_packages(packages);
            state.mark_dirty();
            Vec::new()
        }
        Msg::PackageChosen { package_id } => {
            if state.packages().iter().any(|p| p.id == package_id) {
                vec![Effect::BeginCheckout { package_id }]
            } else {
                Vec::new()
            }
        }
        Msg::CheckoutReady { url } => vec![Effect::OpenCheckout { url }],
        Msg::MergeModeEntered => {
            if state.flow() != MergeFlow::Browsing {
                return (state, Vec::new());
            }
            state.selection_mut().clear();
            state.set_flow(MergeFlow::Selecting);
            state.mark_dirty();
            Vec::new()
        }
        Msg::ClipToggled(clip) => {
            if state.flow() != MergeFlow::Selecting {
                return (state, Vec::new());
            }
            state.selection_mut().toggle(clip);
            state.mark_dirty();
            Vec::new()
        }
        Msg::ClipMoved { index, direction } => {
            if state.flow() != MergeFlow::Selecting {
                return (state, Vec::new());
            }
            if state.selection_mut().move_clip(index, direction) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ClipRemoved { index } => {
            if state.flow() != MergeFlow::Selecting {
                return (state, Vec::new());
            }
            if state.selection_mut().remove(index).is_some() {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::SelectionCancelled => {
            if state.flow() != MergeFlow::Selecting {
                return (state, Vec::new());
            }
            state.selection_mut().clear();
            state.set_flow(MergeFlow::Browsing);
            state.mark_dirty();
            Vec::new()
        }
        Msg::MergeConfirmed => {
            // Invariant: one merge at a time. A confirm while a job runs
            // is ignored, never queued.
            if state.flow() != MergeFlow::Selecting
                || !state.selection().can_merge()
                || state.merge_in_flight()
            {
                return (state, Vec::new());
            }
            let job_id = state.allocate_job_id();
            let clips = state.selection().clips().to_vec();
            state.set_active_job(Some(MergeJobView {
                job_id,
                status: MergeJobStatus::Pending,
                stage: MergeStage::Queued,
                percent: 0,
            }));
            state.set_flow(MergeFlow::Running);
            state.mark_dirty();
            vec![Effect::RunMerge { job_id, clips }]
        }
        Msg::MergeProgress {
            job_id,
            stage,
            percent,
        } => {
            let mut changed = false;
            if let Some(job) = state.active_job_mut() {
                if job.job_id == job_id && !is_terminal(&job.status) {
                    job.status = MergeJobStatus::Running;
                    job.stage = stage;
                    // Percent never moves backwards within one attempt.
                    job.percent = job.percent.max(percent.min(100));
                    changed = true;
                }
            }
            if changed {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::MergeFinished { job_id, result } => {
            let matches_active = state
                .active_job()
                .is_some_and(|job| job.job_id == job_id && !is_terminal(&job.status));
            if !matches_active {
                return (state, Vec::new());
            }
            match result {
                Ok(outcome) => {
                    let clip_count = state.selection().len();
                    if let Some(job) = state.active_job_mut() {
                        job.status = MergeJobStatus::Succeeded {
                            result_url: outcome.result_url.clone(),
                            persisted: outcome.persisted,
                        };
                        job.stage = MergeStage::Done;
                    }
                    state.push_completed_merge(CompletedMergeSnapshot {
                        result_url: outcome.result_url,
                        persisted: outcome.persisted,
                        clip_count,
                    });
                    state.selection_mut().clear();
                    state.set_flow(MergeFlow::Browsing);
                    state.mark_dirty();
                    // A persisted merge shows up in the project history.
                    if outcome.persisted {
                        vec![Effect::LoadHistory]
                    } else {
                        Vec::new()
                    }
                }
                Err(reason) => {
                    if let Some(job) = state.active_job_mut() {
                        job.status = MergeJobStatus::Failed { reason };
                    }
                    // The selection is kept so the user can retry from it.
                    state.set_flow(MergeFlow::Selecting);
                    state.mark_dirty();
                    Vec::new()
                }
            }
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

/// Whitespace word count used for the prompt limit.
pub fn prompt_word_count(prompt: &str) -> usize {
    prompt.split_whitespace().count()
}

fn is_terminal(status: &MergeJobStatus) -> bool {
    matches!(
        status,
        MergeJobStatus::Succeeded { .. } | MergeJobStatus::Failed { .. }
    )
}
