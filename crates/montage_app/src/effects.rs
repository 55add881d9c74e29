use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use engine_logging::{engine_info, engine_warn};
use montage_core::{
    AspectRatio, ClipReference, CreditPackage, Effect, GenerationOutcome, Language,
    MergeOutcomeView, MergeStage, Msg,
};
use montage_engine::{
    EngineConfig, EngineHandle, GenerateRequest, MergeEvent, MergeInput, MergeRequest,
    ServiceClient,
};

/// Bridges core effects to the engine and the service client, feeding
/// results back into the message pump.
pub struct EffectRunner {
    engine: EngineHandle,
    service: ServiceClient,
    runtime: tokio::runtime::Runtime,
    msg_tx: mpsc::Sender<Msg>,
}

impl EffectRunner {
    pub fn new(config: EngineConfig, msg_tx: mpsc::Sender<Msg>) -> Self {
        let service = config.service.clone();
        let engine = EngineHandle::new(config);
        let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
        let runner = Self {
            engine,
            service,
            runtime,
            msg_tx,
        };
        runner.spawn_event_loop();
        runner
    }

    pub fn run(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::LoadHistory => {
                    let service = self.service.clone();
                    let tx = self.msg_tx.clone();
                    self.runtime.spawn(async move {
                        match service.video_history().await {
                            Ok(entries) => {
                                let clips = entries
                                    .iter()
                                    .map(|entry| {
                                        ClipReference::new(
                                            entry.id.clone(),
                                            entry.video_url.clone(),
                                            entry.created_at_ms(),
                                            entry.prompt.clone(),
                                        )
                                    })
                                    .collect();
                                let _ = tx.send(Msg::HistoryLoaded(clips));
                            }
                            Err(err) => engine_warn!("history load failed: {err}"),
                        }
                    });
                }
                Effect::LoadBalance => {
                    let service = self.service.clone();
                    let tx = self.msg_tx.clone();
                    self.runtime.spawn(async move {
                        match service.balance().await {
                            Ok(tokens) => {
                                let _ = tx.send(Msg::BalanceLoaded(tokens));
                            }
                            Err(err) => engine_warn!("balance load failed: {err}"),
                        }
                    });
                }
                Effect::GenerateVideo {
                    prompt,
                    aspect_ratio,
                    language,
                    image_url,
                } => {
                    let request = GenerateRequest {
                        prompt,
                        aspect_ratio: aspect_param(aspect_ratio).to_string(),
                        language: language_param(language).to_string(),
                        image_url,
                    };
                    let service = self.service.clone();
                    let tx = self.msg_tx.clone();
                    self.runtime.spawn(async move {
                        let result = service
                            .generate_video(&request)
                            .await
                            .map(|outcome| GenerationOutcome {
                                video_url: outcome.video_url,
                                tokens_remaining: outcome.tokens_remaining,
                            })
                            .map_err(|err| err.to_string());
                        let _ = tx.send(Msg::GenerateFinished { result });
                    });
                }
                Effect::LoadPackages => {
                    let service = self.service.clone();
                    let tx = self.msg_tx.clone();
                    self.runtime.spawn(async move {
                        match service.payment_packages().await {
                            Ok(packages) => {
                                let packages = packages
                                    .into_iter()
                                    .map(|info| CreditPackage {
                                        id: info.id,
                                        name: info.name,
                                        price_cents: info.price,
                                        tokens: info.tokens,
                                    })
                                    .collect();
                                let _ = tx.send(Msg::PackagesLoaded(packages));
                            }
                            Err(err) => engine_warn!("package load failed: {err}"),
                        }
                    });
                }
                Effect::BeginCheckout { package_id } => {
                    let service = self.service.clone();
                    let tx = self.msg_tx.clone();
                    self.runtime.spawn(async move {
                        let email = service
                            .stored_profile()
                            .map(|profile| profile.email)
                            .unwrap_or_default();
                        match service.create_payment_session(&package_id, &email).await {
                            Ok(url) => {
                                let _ = tx.send(Msg::CheckoutReady { url });
                            }
                            Err(err) => engine_warn!("checkout session failed: {err}"),
                        }
                    });
                }
                Effect::OpenCheckout { url } => {
                    // The browser original redirects; the shell hands over
                    // the link.
                    engine_info!("checkout url ready: {url}");
                    println!("Open this checkout link in your browser:\n  {url}");
                }
                Effect::RunMerge { job_id, clips } => {
                    engine_info!("RunMerge job_id={} clip_count={}", job_id, clips.len());
                    self.engine.enqueue_merge(MergeRequest {
                        job_id,
                        inputs: clips
                            .into_iter()
                            .map(|clip| MergeInput {
                                clip_id: clip.id,
                                source_url: clip.source_url,
                            })
                            .collect(),
                    });
                }
            }
        }
    }

    /// Sign-in runs outside the core update loop, the way the original
    /// login page calls the API directly before navigating.
    pub fn sign_in(&self, email: String, password: String) {
        let service = self.service.clone();
        let tx = self.msg_tx.clone();
        self.runtime.spawn(async move {
            match service.login(&email, &password).await {
                Ok(profile) => {
                    let _ = tx.send(Msg::SignedIn {
                        username: profile.username,
                        email: profile.email,
                        tokens: profile.tokens,
                    });
                }
                Err(err) => {
                    engine_warn!("login failed: {err}");
                    println!("Login failed: {err}");
                }
            }
        });
    }

    pub fn sign_up(&self, username: String, email: String, password: String) {
        let service = self.service.clone();
        let tx = self.msg_tx.clone();
        self.runtime.spawn(async move {
            match service.signup(&username, &email, &password).await {
                Ok(profile) => {
                    let _ = tx.send(Msg::SignedIn {
                        username: profile.username,
                        email: profile.email,
                        tokens: profile.tokens,
                    });
                }
                Err(err) => {
                    engine_warn!("signup failed: {err}");
                    println!("Signup failed: {err}");
                }
            }
        });
    }

    pub fn sign_out(&self) {
        self.service.logout();
        let _ = self.msg_tx.send(Msg::SignedOut);
    }

    /// Uploads a JPEG reference image, then submits a generation request
    /// carrying its public URL (the two-step flow of the original form).
    pub fn generate_with_image(&self, image_path: PathBuf, prompt: String) {
        let bytes = match std::fs::read(&image_path) {
            Ok(content) => Bytes::from(content),
            Err(err) => {
                println!("Could not read {}: {err}", image_path.display());
                return;
            }
        };
        let service = self.service.clone();
        let tx = self.msg_tx.clone();
        self.runtime.spawn(async move {
            match service.upload_image(bytes).await {
                Ok(url) => {
                    let _ = tx.send(Msg::GenerateSubmitted {
                        prompt,
                        aspect_ratio: AspectRatio::default(),
                        language: Language::default(),
                        image_url: Some(url),
                    });
                }
                Err(err) => {
                    engine_warn!("image upload failed: {err}");
                    println!("Image upload failed: {err}");
                }
            }
        });
    }

    /// Re-enters the signed-in state from a persisted session, if any.
    pub fn restore_session(&self) {
        if let Some(profile) = self.service.stored_profile() {
            let _ = self.msg_tx.send(Msg::SignedIn {
                username: profile.username,
                email: profile.email,
                tokens: profile.tokens,
            });
        }
    }

    fn spawn_event_loop(&self) {
        let engine = self.engine.clone();
        let msg_tx = self.msg_tx.clone();
        thread::spawn(move || loop {
            if let Some(event) = engine.try_recv() {
                match event {
                    MergeEvent::Progress(progress) => {
                        let _ = msg_tx.send(Msg::MergeProgress {
                            job_id: progress.job_id,
                            stage: map_stage(progress.stage),
                            percent: progress.percent,
                        });
                    }
                    MergeEvent::Completed { job_id, result } => {
                        let msg = Msg::MergeFinished {
                            job_id,
                            result: match result {
                                Ok(outcome) => Ok(MergeOutcomeView {
                                    result_url: outcome.result_url,
                                    persisted: outcome.persisted,
                                }),
                                Err(err) => {
                                    engine_warn!("merge {} failed: {}", job_id, err);
                                    Err(err.to_string())
                                }
                            },
                        };
                        let _ = msg_tx.send(msg);
                    }
                }
            } else {
                thread::sleep(Duration::from_millis(20));
            }
        });
    }
}

fn map_stage(stage: montage_engine::MergeStage) -> MergeStage {
    match stage {
        montage_engine::MergeStage::Queued => MergeStage::Queued,
        montage_engine::MergeStage::EngineLoading => MergeStage::EngineLoading,
        montage_engine::MergeStage::Staging => MergeStage::Staging,
        montage_engine::MergeStage::Concatenating => MergeStage::Concatenating,
        montage_engine::MergeStage::Publishing => MergeStage::Publishing,
        montage_engine::MergeStage::Done => MergeStage::Done,
    }
}

fn aspect_param(aspect: AspectRatio) -> &'static str {
    match aspect {
        AspectRatio::Landscape => "pc",
        AspectRatio::Portrait => "mobile",
    }
}

fn language_param(language: Language) -> &'static str {
    match language {
        Language::Fr => "fr",
        Language::En => "en",
        Language::Es => "es",
    }
}
