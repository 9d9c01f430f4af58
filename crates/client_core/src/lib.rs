//! Client side of the workflow shell: canonical state, the flow channel,
//! message translation, the guided tour and the event loop tying them together.

pub mod api;
pub mod channel;
pub mod error;
pub mod handler;
pub mod runtime;
pub mod store;
pub mod tour;
pub mod workspace;

pub use api::ApiClient;
pub use channel::{
    ChannelConfig, ConnectionState, ConnectionStatus, HttpTokenProvider, RealtimeChannel,
    TokenProvider,
};
pub use error::{ApiClientError, ChannelError, TokenError};
pub use handler::{HandlerConfigError, MessageHandler, TranslateError, TranslationTable, Translator};
pub use runtime::{ShellCommand, ShellHandle, ShellRuntime, ShellSnapshot};
pub use store::{action_queue, Action, ActionSender, AppState, Dispatch, Store, Subscription};
pub use tour::{
    LifecycleEvent, RawLifecycle, TourController, TourEffect, TourOverrides, TourPhase,
    TourRenderer, TourState, TourStep,
};
pub use workspace::{derive_selected_project, selected_project, workspace_tabs_enabled};
