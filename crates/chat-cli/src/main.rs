mod commands;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use chat_core::paths::{archive_json_path, ensure_voxchat_dir, settings_json_path};
use chat_core::{Config, UserRef};
use chat_loop::{LoopConfig, SessionHandle, SessionRuntime, SessionServices, SessionUpdate};
use chat_services::{
    ChannelRecognizer, HttpTranslator, IdentityTranslator, OpenAIGenerator, TranscriptFeed,
    Translator,
};
use chat_state::{ContextChange, SessionContext, SessionEvent, SessionState};
use clap::Parser;
use colored::Colorize;
use session_manager::{ArchiveService, FileArchiveStorage, RemoteArchiveStorage, SettingsStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::commands::{parse_command, Command, HELP};
use crate::render::{render_sessions, render_status, render_turn};

#[derive(Parser, Debug)]
#[command(name = "voxchat")]
#[command(about = "Voice and text chat with a language model, in the terminal")]
#[command(version)]
struct Cli {
    /// Smaller images and a lower token ceiling
    #[arg(long)]
    compact: bool,

    /// Do not speak answers
    #[arg(long)]
    silent: bool,

    /// Language for recognition, speech and translation (e.g. es-ES)
    #[arg(long, env = "VOXCHAT_LANG")]
    lang: Option<String>,

    /// Sign in as this user; archives go to the remote store
    #[arg(long, env = "VOXCHAT_USER")]
    user: Option<String>,

    /// Where settings and the local archive are kept (default ~/.voxchat)
    #[arg(long, env = "VOXCHAT_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

/// Latest state reported by the loop.
#[derive(Debug, Clone, Default)]
struct SessionView {
    state: SessionState,
    context: SessionContext,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .with_file(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Fold command-line overrides into the saved settings before the session
/// starts, so the snapshot loaded on entry to idle already carries them.
async fn apply_overrides(store: &SettingsStore, cli: &Cli) -> anyhow::Result<()> {
    if !cli.silent && cli.lang.is_none() {
        return Ok(());
    }
    let mut snapshot = store.load().await?.unwrap_or_default();
    if cli.silent {
        snapshot.silent = true;
    }
    if let Some(lang) = &cli.lang {
        ContextChange::LangCode(lang.clone()).validate()?;
        snapshot.lang_code = lang.clone();
    }
    store.save(&snapshot).await?;
    Ok(())
}

fn build_services(
    config: &Config,
    data_dir: &std::path::Path,
    settings_path: PathBuf,
    recognizer: ChannelRecognizer,
) -> anyhow::Result<SessionServices> {
    let generator =
        OpenAIGenerator::from_config(config).context("Set OPENAI_API_KEY or api_key in config")?;

    let translator: Arc<dyn Translator> = if config.translate_url.is_some() {
        Arc::new(HttpTranslator::from_config(config)?)
    } else {
        tracing::info!("No translation service configured, speaking untranslated text");
        Arc::new(IdentityTranslator)
    };

    let mut archive = ArchiveService::new(Arc::new(FileArchiveStorage::new(data_dir)));
    if let Some(remote) = RemoteArchiveStorage::from_config(config) {
        archive = archive.with_remote(Arc::new(remote));
    }

    let settings = SettingsStore::new(settings_path);
    Ok(SessionServices::new(Arc::new(generator), archive, settings)
        .with_translator(translator)
        .with_recognizer(Arc::new(recognizer)))
}

async fn print_updates(mut updates: mpsc::Receiver<SessionUpdate>, view: watch::Sender<SessionView>) {
    let mut last_state: Option<SessionState> = None;
    while let Some(update) = updates.recv().await {
        match update {
            SessionUpdate::StateChanged { state, context, .. } => {
                if last_state.as_ref() != Some(&state) {
                    println!("{}", render_status(&state, &context));
                    last_state = Some(state.clone());
                }
                view.send_replace(SessionView {
                    state,
                    context: *context,
                });
            }
            SessionUpdate::Rendered { turn: Some(turn) } => println!("{}", render_turn(&turn)),
            SessionUpdate::Rendered { turn: None } => {}
            SessionUpdate::Rejected { event, reason } => {
                println!("{}", format!("{} ignored: {}", event, reason).yellow());
            }
        }
    }
}

async fn execute(
    command: Command,
    handle: &SessionHandle,
    feed: &TranscriptFeed,
    view: &watch::Receiver<SessionView>,
) -> anyhow::Result<()> {
    match command {
        Command::Input(text) => {
            if feed.is_listening().await {
                feed.push(text).await?;
            } else {
                handle
                    .send(SessionEvent::change(ContextChange::RequestText(text)))
                    .await?;
                handle.send(SessionEvent::text()).await?;
            }
        }
        Command::Event(event) => handle.send(event).await?,
        Command::Regenerate { index, text } => {
            let question = match text {
                Some(text) => text,
                None => view
                    .borrow()
                    .context
                    .answers
                    .get(index)
                    .map(|turn| turn.question.clone())
                    .ok_or_else(|| anyhow!("There is no answer {}", index))?,
            };
            handle
                .send(SessionEvent::change(ContextChange::RequestText(question)))
                .await?;
            handle.send(SessionEvent::regenerate(index)).await?;
        }
        Command::Restore(question) => {
            let answers = view
                .borrow()
                .context
                .sessions
                .get(&question)
                .cloned()
                .ok_or_else(|| anyhow!("No archived conversation starts with '{}'", question))?;
            handle.send(SessionEvent::Restore { answers }).await?;
        }
        Command::Sessions => println!("{}", render_sessions(&view.borrow().context.sessions)),
        Command::Help => println!("{}", HELP),
        Command::Exit => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::new();
    if cli.compact {
        config.compact = true;
    }

    let (data_dir, settings_path) = match &cli.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            (dir.clone(), dir.join("settings.json"))
        }
        None => {
            let dir = ensure_voxchat_dir().context("Failed to create ~/.voxchat")?;
            tracing::debug!("Local archive at {}", archive_json_path().display());
            (dir, settings_json_path())
        }
    };

    let recognizer = ChannelRecognizer::new();
    let feed = recognizer.feed();
    let services = build_services(&config, &data_dir, settings_path, recognizer)?;
    apply_overrides(&services.settings, &cli).await?;

    let user = cli
        .user
        .as_ref()
        .map(|name| UserRef::new(name.clone(), name.clone()));
    let (runtime, handle, updates) =
        SessionRuntime::load(user, services, LoopConfig::default()).await?;

    let loop_task = tokio::spawn(runtime.run());
    let (view_tx, view_rx) = watch::channel(SessionView::default());
    let printer = tokio::spawn(print_updates(updates, view_tx));

    println!("{}", "voxchat - type /help for commands".bold());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(Command::Exit) => break,
            Ok(command) => {
                if let Err(e) = execute(command, &handle, &feed, &view_rx).await {
                    eprintln!("{}", e.to_string().red());
                }
            }
            Err(e) => eprintln!("{}", e.to_string().yellow()),
        }
        if handle.is_closed() {
            break;
        }
    }

    handle.shutdown();
    let context = loop_task.await??;
    printer.abort();
    tracing::info!(
        "Goodbye ({} archived conversations)",
        context.sessions.len()
    );
    Ok(())
}
