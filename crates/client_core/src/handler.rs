//! Translation of flow channel messages into store actions.

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::Deserialize;
use serde_json::Value;
use shared::{
    domain::{Collection, Notification, NotificationKind, Progress},
    protocol::ChannelMessage,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{Action, Dispatch};

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerConfigError {
    #[error("route for message kind '{kind}' targets unknown translator '{translator}'")]
    UnknownTranslator { kind: String, translator: String },
    #[error("message kind must not be empty")]
    EmptyKind,
}

type TranslateFn = dyn Fn(&Value) -> Result<Vec<Action>, TranslateError> + Send + Sync;

#[derive(Clone)]
pub struct Translator {
    name: String,
    translate: Arc<TranslateFn>,
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator").field("name", &self.name).finish()
    }
}

impl Translator {
    pub fn new(
        name: impl Into<String>,
        translate: impl Fn(&Value) -> Result<Vec<Action>, TranslateError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            translate: Arc::new(translate),
        }
    }

    pub fn constant(name: impl Into<String>, action: Action) -> Self {
        Self::new(name, move |_| Ok(vec![action.clone()]))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn translate(&self, payload: &Value) -> Result<Vec<Action>, TranslateError> {
        (self.translate)(payload)
    }

    pub fn builtin(name: &str) -> Option<Self> {
        let translator = match name {
            "hydrate" => Self::constant(name, Action::Hydrate),
            "spin_logo" => Self::constant(name, Action::SpinLogo),
            "refresh_projects" => Self::constant(name, Action::refresh(Collection::Projects)),
            "refresh_datasets" => Self::constant(name, Action::refresh(Collection::Datasets)),
            "refresh_featuresets" => {
                Self::constant(name, Action::refresh(Collection::Featuresets))
            }
            "refresh_models" => Self::constant(name, Action::refresh(Collection::Models)),
            "refresh_predictions" => {
                Self::constant(name, Action::refresh(Collection::Predictions))
            }
            "show_notification" => Self::new(name, translate_notification),
            "update_progress" => Self::new(name, translate_progress),
            "ignore" => Self::new(name, |_| Ok(Vec::new())),
            _ => return None,
        };
        Some(translator)
    }
}

#[derive(Deserialize)]
struct NotificationPayload {
    note: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

fn translate_notification(payload: &Value) -> Result<Vec<Action>, TranslateError> {
    let NotificationPayload { note, kind } = NotificationPayload::deserialize(payload)?;
    let kind = match kind.as_deref() {
        Some("error") => NotificationKind::Error,
        _ => NotificationKind::Info,
    };
    Ok(vec![Action::ShowNotification {
        notification: Notification::new(note, kind),
    }])
}

#[derive(Deserialize)]
struct ProgressPayload {
    stage: String,
    pct: f64,
}

fn translate_progress(payload: &Value) -> Result<Vec<Action>, TranslateError> {
    let ProgressPayload { stage, pct } = ProgressPayload::deserialize(payload)?;
    if !pct.is_finite() {
        return Err(TranslateError::Invalid(format!(
            "progress for stage '{stage}' is not a number"
        )));
    }
    Ok(vec![Action::UpdateProgress {
        progress: Progress {
            stage,
            pct: pct.round().clamp(0.0, 100.0) as u8,
        },
    }])
}

const DEFAULT_ROUTES: &[(&str, &str)] = &[
    ("cesium/FETCH_PROJECTS", "refresh_projects"),
    ("FETCH_PROJECTS", "refresh_projects"),
    ("cesium/FETCH_DATASETS", "refresh_datasets"),
    ("cesium/FETCH_FEATURESETS", "refresh_featuresets"),
    ("cesium/FETCH_MODELS", "refresh_models"),
    ("cesium/FETCH_PREDICTIONS", "refresh_predictions"),
    ("cesium/SHOW_NOTIFICATION", "show_notification"),
    ("cesium/SPIN_LOGO", "spin_logo"),
    ("progress", "update_progress"),
];

#[derive(Debug, Clone, Default)]
pub struct TranslationTable {
    routes: BTreeMap<String, Translator>,
}

impl TranslationTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut table = Self::empty();
        for (kind, name) in DEFAULT_ROUTES {
            if let Some(translator) = Translator::builtin(name) {
                table.routes.insert((*kind).to_string(), translator);
            }
        }
        table
    }

    /// Default routes plus `routes` (kind -> builtin translator name).
    /// Unknown translator names are rejected here.
    pub fn from_routes<'a>(
        routes: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Result<Self, HandlerConfigError> {
        let mut table = Self::with_defaults();
        for (kind, name) in routes {
            let translator =
                Translator::builtin(name).ok_or_else(|| HandlerConfigError::UnknownTranslator {
                    kind: kind.clone(),
                    translator: name.clone(),
                })?;
            table.insert(kind.clone(), translator)?;
        }
        Ok(table)
    }

    pub fn insert(
        &mut self,
        kind: impl Into<String>,
        translator: Translator,
    ) -> Result<(), HandlerConfigError> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(HandlerConfigError::EmptyKind);
        }
        self.routes.insert(kind, translator);
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Option<&Translator> {
        self.routes.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

pub struct MessageHandler<D: Dispatch> {
    table: TranslationTable,
    dispatcher: D,
}

impl<D: Dispatch> MessageHandler<D> {
    pub fn new(table: TranslationTable, dispatcher: D) -> Self {
        Self { table, dispatcher }
    }

    pub fn translate(&self, message: &ChannelMessage) -> Vec<Action> {
        let Some(translator) = self.table.get(&message.kind) else {
            warn!(kind = %message.kind, "dropping flow message of unrecognized kind");
            return Vec::new();
        };
        match translator.translate(&message.payload) {
            Ok(actions) => actions,
            Err(err) => {
                warn!(
                    kind = %message.kind,
                    translator = translator.name(),
                    error = %err,
                    "dropping flow message with undecodable payload"
                );
                Vec::new()
            }
        }
    }

    pub fn handle(&self, message: &ChannelMessage) {
        let actions = self.translate(message);
        debug!(kind = %message.kind, actions = actions.len(), "translated flow message");
        for action in actions {
            self.dispatcher.dispatch(action);
        }
    }

    pub fn table(&self) -> &TranslationTable {
        &self.table
    }
}

#[cfg(test)]
#[path = "tests/handler_tests.rs"]
mod tests;
