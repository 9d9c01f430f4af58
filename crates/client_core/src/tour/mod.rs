//! Guided tour: step definitions, lifecycle events and the controller.

mod controller;
mod overrides;
mod steps;

pub use controller::{StepSideEffect, TourController, TourEffect, TourPhase};
pub use overrides::{resolve, TourOverrides};
pub use steps::{
    default_side_effects, default_steps, load_tour_steps, parse_tour_steps, TourConfigError,
    PROJECT_PANEL_EXPANDER,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorPosition {
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TourStep {
    pub text: String,
    pub selector: String,
    pub position: AnchorPosition,
}

impl TourStep {
    pub fn new(text: impl Into<String>, selector: impl Into<String>, position: AnchorPosition) -> Self {
        Self {
            text: text.into(),
            selector: selector.into(),
            position,
        }
    }
}

/// Owned exclusively by the [`TourController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TourState {
    pub cursor: usize,
    pub running: bool,
    pub auto_start: bool,
    pub show_skip_button: bool,
}

impl Default for TourState {
    fn default() -> Self {
        Self {
            cursor: 0,
            running: false,
            auto_start: false,
            show_skip_button: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleKind {
    BeforeStep,
    AfterFinish,
    Closed,
    TargetNotFound,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Next,
    Back,
    Close,
    Esc,
    Skip,
    None,
}

impl LifecycleAction {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "next" => Self::Next,
            "back" => Self::Back,
            "close" => Self::Close,
            "esc" => Self::Esc,
            "skip" => Self::Skip,
            _ => Self::None,
        }
    }

    pub fn is_dismissal(self) -> bool {
        matches!(self, Self::Close | Self::Esc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub kind: LifecycleKind,
    pub step_index: usize,
    pub action: LifecycleAction,
}

impl LifecycleEvent {
    pub fn new(kind: LifecycleKind, step_index: usize, action: LifecycleAction) -> Self {
        Self {
            kind,
            step_index,
            action,
        }
    }

    pub fn before_step(step_index: usize) -> Self {
        Self::new(LifecycleKind::BeforeStep, step_index, LifecycleAction::Next)
    }
}

/// Callback record as delivered by the renderer: `{index, type, action}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLifecycle {
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub action: String,
}

impl RawLifecycle {
    pub fn new(index: usize, kind: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            index,
            kind: kind.into(),
            action: action.into(),
        }
    }

    /// Classifies the record. A close or esc action turns any record except a
    /// target-not-found error into `Closed`.
    pub fn into_event(self) -> LifecycleEvent {
        let action = LifecycleAction::parse(&self.action);
        let kind = match self.kind.as_str() {
            "error:target_not_found" => LifecycleKind::TargetNotFound,
            _ if action.is_dismissal() => LifecycleKind::Closed,
            "step:before" => LifecycleKind::BeforeStep,
            "finished" => LifecycleKind::AfterFinish,
            _ => LifecycleKind::Other,
        };
        LifecycleEvent::new(kind, self.index, action)
    }
}

pub trait TourRenderer {
    /// Paint the step at `state.cursor`. A cursor past the last step means the tour is over.
    fn render(&mut self, steps: &[TourStep], state: &TourState);
    fn reset(&mut self);
}

#[cfg(test)]
#[path = "../tests/tour_tests.rs"]
mod tests;
