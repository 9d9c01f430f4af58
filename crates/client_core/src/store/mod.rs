mod action;
mod reducer;
mod state;

pub use action::Action;
pub use reducer::reduce;
pub use state::{
    AppState, DatasetsState, FeaturesetsState, MiscState, ModelsState, PredictionsState,
    ProjectsState,
};

use tokio::sync::mpsc;
use tracing::{debug, trace};

type Subscriber = Box<dyn FnMut(&AppState, &Action)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

pub struct Store {
    state: AppState,
    subscribers: Vec<(Subscription, Subscriber)>,
    next_subscription: u64,
    applied: u64,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

impl Store {
    pub fn new(initial: AppState) -> Self {
        Self {
            state: initial,
            subscribers: Vec::new(),
            next_subscription: 0,
            applied: 0,
        }
    }

    /// Applies `action` immediately, then notifies subscribers in subscription order.
    pub fn dispatch(&mut self, action: Action) {
        reduce(&mut self.state, &action);
        self.applied += 1;
        debug!(
            action = action.type_name(),
            seq = self.applied,
            "applied store action"
        );
        for (subscription, callback) in self.subscribers.iter_mut() {
            trace!(subscription = subscription.0, "notifying subscriber");
            callback(&self.state, &action);
        }
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&AppState, &Action) + 'static) -> Subscription {
        let subscription = Subscription(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((subscription, Box::new(callback)));
        subscription
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(s, _)| *s != subscription);
        before != self.subscribers.len()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn get_state(&self) -> AppState {
        self.state.clone()
    }

    pub fn applied_count(&self) -> u64 {
        self.applied
    }
}

pub trait Dispatch {
    fn dispatch(&self, action: Action);
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedAction {
    pub producer: &'static str,
    pub action: Action,
}

#[derive(Debug, Clone)]
pub struct ActionSender {
    producer: &'static str,
    tx: mpsc::UnboundedSender<QueuedAction>,
}

impl ActionSender {
    pub fn new(producer: &'static str, tx: mpsc::UnboundedSender<QueuedAction>) -> Self {
        Self { producer, tx }
    }

    pub fn for_producer(&self, producer: &'static str) -> Self {
        Self {
            producer,
            tx: self.tx.clone(),
        }
    }

    pub fn producer(&self) -> &'static str {
        self.producer
    }
}

impl Dispatch for ActionSender {
    fn dispatch(&self, action: Action) {
        let kind = action.type_name();
        if self
            .tx
            .send(QueuedAction {
                producer: self.producer,
                action,
            })
            .is_err()
        {
            debug!(
                producer = self.producer,
                action = kind,
                "action queue closed; dropping request"
            );
        }
    }
}

pub fn action_queue() -> (ActionSender, mpsc::UnboundedReceiver<QueuedAction>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ActionSender::new("shell", tx), rx)
}

#[cfg(test)]
#[path = "../tests/store_tests.rs"]
mod tests;
