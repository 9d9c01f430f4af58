use std::collections::BTreeSet;

use serde::Serialize;
use shared::domain::{Collection, ProjectId};
use tokio::{
    sync::{mpsc, watch},
    task::JoinSet,
};
use tracing::{debug, info, warn};

use crate::{
    api::ApiClient,
    channel::{ConnectionStatus, RealtimeChannel},
    error::ApiClientError,
    handler::{MessageHandler, TranslationTable},
    store::{action_queue, Action, ActionSender, AppState, Dispatch, QueuedAction, Store},
    tour::{
        resolve, RawLifecycle, TourController, TourEffect, TourOverrides, TourPhase,
        TourRenderer, TourState,
    },
    workspace::selected_project,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    StartTour,
    StopTour,
    ResumeTour,
    SelectProject(ProjectId),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShellSnapshot {
    pub state: AppState,
    pub tour: TourState,
    pub tour_phase: TourPhase,
    pub selected_project: ProjectId,
    /// Authenticated and receiving pushes.
    pub channel_open: bool,
}

#[derive(Clone)]
pub struct ShellHandle {
    commands: mpsc::UnboundedSender<ShellCommand>,
    lifecycle: mpsc::UnboundedSender<RawLifecycle>,
    actions: ActionSender,
    snapshots: watch::Receiver<ShellSnapshot>,
}

impl ShellHandle {
    /// Returns `false` once the runtime has stopped.
    pub fn send(&self, command: ShellCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn lifecycle(&self) -> mpsc::UnboundedSender<RawLifecycle> {
        self.lifecycle.clone()
    }

    pub fn actions(&self, producer: &'static str) -> ActionSender {
        self.actions.for_producer(producer)
    }

    pub fn snapshots(&self) -> watch::Receiver<ShellSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> ShellSnapshot {
        self.snapshots.borrow().clone()
    }
}

type FetchResult = (Collection, Result<Action, ApiClientError>);

pub struct ShellRuntime {
    store: Store,
    tour: TourController,
    overrides: TourOverrides,
    renderer: Option<Box<dyn TourRenderer>>,
    handler: MessageHandler<ActionSender>,
    tour_actions: ActionSender,
    action_rx: mpsc::UnboundedReceiver<QueuedAction>,
    lifecycle_rx: mpsc::UnboundedReceiver<RawLifecycle>,
    command_rx: mpsc::UnboundedReceiver<ShellCommand>,
    channel: Option<RealtimeChannel>,
    api: Option<ApiClient>,
    fetches: JoinSet<FetchResult>,
    in_flight: BTreeSet<Collection>,
    refetch: BTreeSet<Collection>,
    snapshots: watch::Sender<ShellSnapshot>,
}

impl ShellRuntime {
    pub fn new(table: TranslationTable, tour: TourController) -> (Self, ShellHandle) {
        let (actions, action_rx) = action_queue();
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let store = Store::default();
        let initial = ShellSnapshot {
            state: store.get_state(),
            tour: *tour.state(),
            tour_phase: tour.phase(),
            selected_project: ProjectId::default(),
            channel_open: false,
        };
        let (snapshots, snapshot_rx) = watch::channel(initial);

        let runtime = Self {
            store,
            tour,
            overrides: TourOverrides::default(),
            renderer: None,
            handler: MessageHandler::new(table, actions.for_producer("flow")),
            tour_actions: actions.for_producer("tour"),
            action_rx,
            lifecycle_rx,
            command_rx,
            channel: None,
            api: None,
            fetches: JoinSet::new(),
            in_flight: BTreeSet::new(),
            refetch: BTreeSet::new(),
            snapshots,
        };
        let handle = ShellHandle {
            commands: command_tx,
            lifecycle: lifecycle_tx,
            actions,
            snapshots: snapshot_rx,
        };
        (runtime, handle)
    }

    pub fn with_renderer(mut self, renderer: Box<dyn TourRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_channel(mut self, channel: RealtimeChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_api(mut self, api: ApiClient) -> Self {
        self.api = Some(api);
        self
    }

    pub fn with_overrides(mut self, overrides: TourOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub async fn run(mut self) -> ShellSnapshot {
        info!(
            channel = self.channel.is_some(),
            api = self.api.is_some(),
            "shell runtime started"
        );
        self.apply(Action::Hydrate);
        self.render();
        self.publish();

        loop {
            tokio::select! {
                biased;

                command = self.command_rx.recv() => {
                    match command {
                        Some(ShellCommand::Shutdown) | None => break,
                        Some(command) => self.handle_command(command),
                    }
                }

                Some(queued) = self.action_rx.recv() => {
                    debug!(producer = queued.producer, action = queued.action.type_name(), "dequeued action");
                    self.apply(queued.action);
                }

                Some(raw) = self.lifecycle_rx.recv() => {
                    let effects = self.tour.handle(raw.into_event());
                    self.apply_tour_effects(effects);
                    self.render();
                }

                Some(joined) = self.fetches.join_next() => {
                    match joined {
                        Ok((collection, result)) => self.finish_fetch(collection, result),
                        Err(err) => warn!(error = %err, "collection fetch task failed"),
                    }
                }

                message = next_channel_message(&mut self.channel) => {
                    match message {
                        Some(message) => self.handler.handle(&message),
                        None => {
                            warn!("flow channel ended; continuing without live updates");
                            self.channel = None;
                        }
                    }
                }
            }
            self.publish();
        }

        if let Some(channel) = self.channel.as_mut() {
            channel.close();
        }
        self.fetches.abort_all();
        // Requests issued before shutdown are still applied, in queue order.
        while let Ok(queued) = self.action_rx.try_recv() {
            self.store.dispatch(queued.action);
        }
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.reset();
        }
        self.publish();
        info!(applied = self.store.applied_count(), "shell runtime stopped");
        self.snapshots.borrow().clone()
    }

    fn handle_command(&mut self, command: ShellCommand) {
        debug!(?command, "shell command");
        let effects = match command {
            ShellCommand::StartTour => self.tour.start(),
            ShellCommand::StopTour => self.tour.stop(),
            ShellCommand::ResumeTour => self.tour.resume(),
            ShellCommand::SelectProject(id) => {
                self.apply(Action::SelectProject { id });
                return;
            }
            ShellCommand::Shutdown => return,
        };
        self.apply_tour_effects(effects);
        self.render();
    }

    fn apply_tour_effects(&mut self, effects: Vec<TourEffect>) {
        for effect in effects {
            match effect {
                TourEffect::Dispatch(action) => self.tour_actions.dispatch(action),
                TourEffect::ResetRenderer => {
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.reset();
                    }
                }
            }
        }
    }

    fn render(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let effective = resolve(&self.overrides, self.tour.state());
        renderer.render(self.tour.steps(), &effective);
    }

    fn apply(&mut self, action: Action) {
        let requested: Vec<Collection> = match &action {
            Action::Hydrate => Collection::ALL.to_vec(),
            Action::Refresh { collection } => vec![*collection],
            _ => Vec::new(),
        };
        self.store.dispatch(action);
        for collection in requested {
            self.request_fetch(collection);
        }
    }

    fn request_fetch(&mut self, collection: Collection) {
        let Some(api) = self.api.clone() else {
            debug!(collection = collection.as_str(), "no api client; leaving collection stale");
            return;
        };
        if self.in_flight.contains(&collection) {
            self.refetch.insert(collection);
            return;
        }
        self.in_flight.insert(collection);
        self.fetches
            .spawn(async move { (collection, api.fetch_collection(collection).await) });
    }

    fn finish_fetch(&mut self, collection: Collection, result: Result<Action, ApiClientError>) {
        self.in_flight.remove(&collection);
        match result {
            Ok(action) => self.store.dispatch(action),
            Err(err) => warn!(
                collection = collection.as_str(),
                error = %err,
                "collection refresh failed; keeping stale data"
            ),
        }
        if self.refetch.remove(&collection) {
            self.request_fetch(collection);
        }
    }

    fn publish(&self) {
        let snapshot = ShellSnapshot {
            state: self.store.get_state(),
            tour: resolve(&self.overrides, self.tour.state()),
            tour_phase: self.tour.phase(),
            selected_project: selected_project(self.store.state()).id,
            channel_open: self.channel.as_ref().is_some_and(|c| {
                !c.is_closed() && c.connection_state().status == ConnectionStatus::Open
            }),
        };
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

async fn next_channel_message(
    channel: &mut Option<RealtimeChannel>,
) -> Option<shared::protocol::ChannelMessage> {
    match channel {
        Some(channel) => channel.next_message().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
