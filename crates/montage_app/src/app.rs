use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use engine_logging::engine_info;
use montage_core::{
    update, AppState, AppViewModel, AspectRatio, Effect, Language, MergeFlow, MergeJobStatus,
    MoveDirection, Msg, VIDEO_TOKEN_COST,
};
use montage_engine::{EngineConfig, FetchSettings, ServiceClient};

use crate::config::AppConfig;
use crate::effects::EffectRunner;
use crate::logging::{self, LogDestination};
use crate::persistence::{self, FileSessionStore};

pub fn run(config: AppConfig) -> anyhow::Result<()> {
    logging::initialize(LogDestination::File);
    engine_info!("montage starting against {}", config.service_base_url);

    let session = Arc::new(FileSessionStore::load(&config.output_dir));
    let service = ServiceClient::new(config.service_base_url.clone(), session)?;
    let engine_config = EngineConfig {
        fetch: FetchSettings::default(),
        engine_base_url: config.engine_base_url.clone(),
        output_dir: config.output_dir.clone(),
        service,
    };

    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let runner = EffectRunner::new(engine_config, msg_tx);

    let mut state = AppState::new();

    let completed = persistence::load_completed_merges(&config.output_dir);
    if !completed.is_empty() {
        dispatch(
            &mut state,
            &runner,
            &config,
            Msg::RestoreCompletedMerges(completed),
        );
    }
    runner.restore_session();

    let line_rx = spawn_stdin_reader();
    print_help();

    loop {
        while let Ok(msg) = msg_rx.try_recv() {
            dispatch(&mut state, &runner, &config, msg);
        }
        match line_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(line) => {
                let line = line.trim().to_string();
                if line == "quit" || line == "exit" {
                    break;
                }
                handle_line(&line, &mut state, &runner, &config);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

fn dispatch(state: &mut AppState, runner: &EffectRunner, config: &AppConfig, msg: Msg) {
    let persist_after = matches!(msg, Msg::MergeFinished { .. });
    let current = std::mem::take(state);
    let (mut next, effects) = update(current, msg);
    if persist_after {
        persistence::save_completed_merges(&config.output_dir, next.completed_merges());
    }
    let dirty = next.consume_dirty();
    *state = next;
    runner.run(effects);
    if dirty {
        render(&state.view());
    }
}

fn handle_line(line: &str, state: &mut AppState, runner: &EffectRunner, config: &AppConfig) {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return;
    };
    let args: Vec<&str> = parts.collect();

    match command {
        "help" => print_help(),
        "status" => print_status(state),
        "login" if args.len() == 2 => {
            runner.sign_in(args[0].to_string(), args[1].to_string());
        }
        "signup" if args.len() == 3 => {
            runner.sign_up(args[0].to_string(), args[1].to_string(), args[2].to_string());
        }
        "logout" => runner.sign_out(),
        "history" => runner.run(vec![Effect::LoadHistory]),
        "balance" => runner.run(vec![Effect::LoadBalance]),
        "generate" if !args.is_empty() => {
            dispatch(
                state,
                runner,
                config,
                Msg::GenerateSubmitted {
                    prompt: args.join(" "),
                    aspect_ratio: AspectRatio::default(),
                    language: Language::default(),
                    image_url: None,
                },
            );
        }
        "generate-img" if args.len() >= 2 => {
            runner.generate_with_image(PathBuf::from(args[0]), args[1..].join(" "));
        }
        "packages" => dispatch(state, runner, config, Msg::RechargeClicked),
        "buy" if args.len() == 1 => {
            dispatch(
                state,
                runner,
                config,
                Msg::PackageChosen {
                    package_id: args[0].to_string(),
                },
            );
        }
        "select" => dispatch(state, runner, config, Msg::MergeModeEntered),
        "add" if args.len() == 1 => match parse_index(args[0]) {
            Some(index) => match state.history().get(index).cloned() {
                Some(clip) => dispatch(state, runner, config, Msg::ClipToggled(clip)),
                None => println!("No history entry {index} (run `history` first)."),
            },
            None => println!("Usage: add <history index>"),
        },
        "up" | "down" if args.len() == 1 => match parse_index(args[0]) {
            Some(index) => {
                let direction = if command == "up" {
                    MoveDirection::Up
                } else {
                    MoveDirection::Down
                };
                dispatch(state, runner, config, Msg::ClipMoved { index, direction });
            }
            None => println!("Usage: {command} <selection index>"),
        },
        "rm" if args.len() == 1 => match parse_index(args[0]) {
            Some(index) => dispatch(state, runner, config, Msg::ClipRemoved { index }),
            None => println!("Usage: rm <selection index>"),
        },
        "cancel" => dispatch(state, runner, config, Msg::SelectionCancelled),
        "merge" => {
            if state.merge_in_flight() {
                println!("A merge is already running.");
            } else if !state.selection().can_merge() {
                println!("Select at least 2 clips before merging.");
            } else {
                dispatch(state, runner, config, Msg::MergeConfirmed);
            }
        }
        _ => println!("Unknown command: {command} (try `help`)."),
    }
}

fn parse_index(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok()
}

fn render(view: &AppViewModel) {
    if let Some(name) = &view.signed_in_as {
        let tokens = view.token_balance.unwrap_or(0);
        println!(
            "[{name} | {tokens} credits | {} clips in history]",
            view.history_count
        );
    } else {
        println!("[not signed in]");
    }

    if view.flow == MergeFlow::Selecting {
        println!("Selection ({} clips):", view.selection.len());
        for row in &view.selection {
            println!(
                "  {}. {} - {}",
                row.position,
                row.clip_id,
                truncate(&row.prompt, 40)
            );
        }
        if view.can_merge {
            println!("Ready to merge. Type `merge` to start.");
        }
    }

    if let Some(job) = &view.active_job {
        match &job.status {
            MergeJobStatus::Pending | MergeJobStatus::Running => {
                println!("Merge #{}: {:?} {}%", job.job_id, job.stage, job.percent);
            }
            MergeJobStatus::Succeeded {
                result_url,
                persisted,
            } => {
                let note = if *persisted {
                    "saved to your projects"
                } else {
                    "local only, upload failed"
                };
                println!("Merge #{} finished: {result_url} ({note})", job.job_id);
            }
            MergeJobStatus::Failed { reason } => {
                println!("Merge #{} failed: {reason}", job.job_id);
            }
        }
    }

    if view.generating {
        println!("Generating video, please wait...");
    }
    if let Some(url) = &view.last_generated_url {
        println!("Last generated video: {url}");
    }
    if !view.packages.is_empty() && view.flow == MergeFlow::Browsing {
        println!("Credit packages:");
        for pkg in &view.packages {
            println!(
                "  {} - {}: {:.2} EUR for {} tokens",
                pkg.id,
                pkg.name,
                pkg.price_cents as f64 / 100.0,
                pkg.tokens
            );
        }
    }
    if let Some(error) = &view.last_error {
        println!("Error: {error}");
    }
}

fn print_status(state: &AppState) {
    render(&state.view());
    if !state.history().is_empty() {
        println!("History:");
        for (index, clip) in state.history().iter().enumerate() {
            let date = DateTime::<Utc>::from_timestamp_millis(clip.created_at_ms)
                .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let marker = if state.selection().contains(&clip.id) {
                "*"
            } else {
                " "
            };
            println!(" {marker}{index}. [{date}] {}", truncate(&clip.prompt, 60));
        }
    }
    println!("Completed merges: {}", state.completed_merges().len());
    println!("Generation cost: {VIDEO_TOKEN_COST} credits per video.");
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}

fn print_help() {
    println!("Commands:");
    println!("  login <email> <password>     sign in");
    println!("  signup <user> <email> <pw>   create an account");
    println!("  logout                       sign out");
    println!("  history                      refresh the project listing");
    println!("  balance                      refresh the credit balance");
    println!("  generate <prompt...>         request a new 8s video");
    println!("  generate-img <jpg> <prompt>  generate from a reference image");
    println!("  packages / buy <id>          recharge credits");
    println!("  select                       start picking clips to merge");
    println!("  add <n>                      toggle history clip n");
    println!("  up <n> / down <n> / rm <n>   reorder or drop a selected clip");
    println!("  merge / cancel               run or abandon the merge");
    println!("  status                       show state, history and selection");
    println!("  quit                         exit");
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(text) => {
                    if tx.send(text).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}
