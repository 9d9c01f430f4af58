use std::{
    collections::BTreeSet,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use client_core::{
    tour::{default_side_effects, default_steps, load_tour_steps},
    ApiClient, ChannelConfig, HttpTokenProvider, RealtimeChannel, ShellCommand, ShellHandle,
    ShellRuntime, ShellSnapshot, TourController, TranslationTable,
};
use shared::domain::ProjectId;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::watch,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use url::Url;

mod renderer;
mod settings;

use renderer::{deliver, HeadlessRenderer, Overlay};
use settings::{load_settings, Settings};

#[derive(Parser, Debug)]
struct Args {
    /// Settings file; a missing file is not an error.
    #[arg(long, default_value = "shell.toml")]
    config: PathBuf,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    tour_file: Option<PathBuf>,
    /// Do not open the flow channel.
    #[arg(long)]
    offline: bool,
}

impl Args {
    fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.server_url {
            settings.server_url = v;
        }
        if let Some(v) = self.username {
            settings.username = Some(v);
        }
        if let Some(v) = self.tour_file {
            settings.tour_file = Some(v);
        }
        settings.offline |= self.offline;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(&args.config)
        .with_context(|| format!("failed to load settings from '{}'", args.config.display()))?;
    args.apply(&mut settings);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // The store lives on one thread; the runtime is current-thread on purpose.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(run(settings))
}

async fn run(settings: Settings) -> Result<()> {
    let table = TranslationTable::from_routes(
        settings
            .routes
            .iter()
            .map(|route| (&route.kind, &route.translator)),
    )
    .context("invalid message routes")?;
    let steps = match &settings.tour_file {
        Some(path) => load_tour_steps(path)?,
        None => default_steps(),
    };
    let (runtime, handle) = ShellRuntime::new(table, TourController::new(steps, default_side_effects()));

    let overlay = Arc::new(Mutex::new(Overlay::new(
        settings.missing_selectors.iter().cloned(),
    )));
    let http = reqwest::Client::new();
    let mut runtime = runtime
        .with_renderer(Box::new(HeadlessRenderer::new(
            overlay.clone(),
            handle.lifecycle(),
        )))
        .with_overrides(settings.tour)
        .with_api(ApiClient::new(http.clone(), settings.server_url.clone()));

    if settings.offline {
        info!("offline mode; flow channel disabled");
    } else {
        let mut config = ChannelConfig::new(settings.server_url.clone());
        config.ws_url = settings.ws_url.clone();
        config.max_retries = settings.max_retries;
        let token_url = match &settings.username {
            Some(username) => {
                Url::parse_with_params(&config.token_url(), [("username", username.as_str())])
                    .context("invalid server url")?
                    .to_string()
            }
            None => config.token_url(),
        };
        let tokens = Arc::new(HttpTokenProvider::new(http, token_url));
        let channel =
            RealtimeChannel::connect(config, tokens).context("failed to start flow channel")?;
        runtime = runtime.with_channel(channel);
    }

    tokio::spawn(print_notifications(handle.snapshots()));
    let commands = tokio::spawn(read_commands(handle, overlay));
    print_help();

    let last = runtime.run().await;
    commands.abort();
    info!(
        hydrated = last.state.hydrated,
        projects = last.state.projects.project_list.len(),
        "shell stopped"
    );
    Ok(())
}

fn print_help() {
    println!("commands: start | next | back | skip | close | stop | resume | select <project id> | state | quit");
}

async fn read_commands(handle: ShellHandle, overlay: Arc<Mutex<Overlay>>) -> Result<()> {
    let lifecycle = handle.lifecycle();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            continue;
        };
        match word {
            "start" => {
                handle.send(ShellCommand::StartTour);
            }
            "stop" => {
                handle.send(ShellCommand::StopTour);
            }
            "resume" => {
                handle.send(ShellCommand::ResumeTour);
            }
            "next" | "back" | "skip" | "close" => {
                let mut overlay = overlay
                    .lock()
                    .map_err(|_| anyhow!("tour overlay lock poisoned"))?;
                let events = match word {
                    "next" => overlay.next(),
                    "back" => overlay.back(),
                    "skip" => overlay.skip(),
                    _ => overlay.close(),
                };
                if events.is_empty() {
                    println!("no tour step is showing; try 'start' or 'resume'");
                }
                deliver(&overlay, events, &lifecycle);
            }
            "select" => match words.next() {
                Some(id) => {
                    handle.send(ShellCommand::SelectProject(ProjectId::new(id)));
                }
                None => println!("usage: select <project id>"),
            },
            "state" => println!("{}", serde_json::to_string_pretty(&handle.snapshot())?),
            "quit" | "exit" => break,
            "help" => print_help(),
            other => println!("unknown command '{other}'; try 'help'"),
        }
    }
    handle.send(ShellCommand::Shutdown);
    Ok(())
}

async fn print_notifications(mut snapshots: watch::Receiver<ShellSnapshot>) {
    let mut seen = BTreeSet::new();
    while snapshots.changed().await.is_ok() {
        let fresh: Vec<_> = snapshots
            .borrow_and_update()
            .state
            .notifications
            .iter()
            .filter(|n| seen.insert(n.id))
            .cloned()
            .collect();
        for notification in fresh {
            println!("[{:?}] {}", notification.kind, notification.note);
        }
    }
    debug!("shell runtime gone; notification printer stopping");
}
