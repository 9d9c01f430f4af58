use std::{collections::BTreeSet, sync::Arc};

use serde::Serialize;
use tracing::{debug, info};

use super::{LifecycleAction, LifecycleEvent, LifecycleKind, TourState, TourStep};
use crate::store::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TourPhase {
    Idle,
    Active,
    /// Running with auto-start off; the cursor is kept for `resume`.
    Paused,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TourEffect {
    Dispatch(Action),
    ResetRenderer,
}

/// Store mutations tied to a group of steps.
///
/// `on_enter` fires once when the cursor moves into `steps` from outside;
/// `on_exit` fires once when it leaves again, including on close and finish.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSideEffect {
    pub region: String,
    pub steps: BTreeSet<usize>,
    pub on_enter: Action,
    pub on_exit: Option<Action>,
}

impl StepSideEffect {
    pub fn covers(&self, step_index: usize) -> bool {
        self.steps.contains(&step_index)
    }
}

pub struct TourController {
    steps: Arc<[TourStep]>,
    side_effects: Vec<StepSideEffect>,
    state: TourState,
    phase: TourPhase,
    /// Index into `side_effects` of the region whose `on_enter` has fired.
    entered_region: Option<usize>,
}

impl TourController {
    pub fn new(steps: impl Into<Arc<[TourStep]>>, side_effects: Vec<StepSideEffect>) -> Self {
        Self {
            steps: steps.into(),
            side_effects,
            state: TourState::default(),
            phase: TourPhase::Idle,
            entered_region: None,
        }
    }

    pub fn steps(&self) -> &[TourStep] {
        &self.steps
    }

    pub fn state(&self) -> &TourState {
        &self.state
    }

    pub fn phase(&self) -> TourPhase {
        self.phase
    }

    pub fn current_step(&self) -> Option<&TourStep> {
        self.steps.get(self.state.cursor)
    }

    pub fn is_past_end(&self) -> bool {
        self.state.cursor >= self.steps.len()
    }

    /// Explicit start request. Restarts from step 0 in every phase.
    pub fn start(&mut self) -> Vec<TourEffect> {
        let mut effects = Vec::new();
        self.leave_region(&mut effects);
        self.state.cursor = 0;
        self.state.running = true;
        self.state.auto_start = true;
        self.phase = TourPhase::Active;
        info!(steps = self.steps.len(), "tour started");
        effects
    }

    /// Explicit stop request; same hard reset as a close from the renderer.
    pub fn stop(&mut self) -> Vec<TourEffect> {
        let mut effects = Vec::new();
        self.reset(&mut effects);
        effects
    }

    pub fn resume(&mut self) -> Vec<TourEffect> {
        if self.phase == TourPhase::Paused {
            self.state.auto_start = true;
            self.phase = TourPhase::Active;
            debug!(cursor = self.state.cursor, "tour resumed");
        }
        Vec::new()
    }

    pub fn handle(&mut self, event: LifecycleEvent) -> Vec<TourEffect> {
        let mut effects = Vec::new();
        match event.kind {
            LifecycleKind::BeforeStep => self.enter_step(event.step_index, &mut effects),
            LifecycleKind::AfterFinish => {
                if self.state.running {
                    self.leave_region(&mut effects);
                    info!(cursor = self.state.cursor, "tour finished");
                    self.clear_state();
                    self.phase = TourPhase::Finished;
                }
            }
            LifecycleKind::Closed => self.reset(&mut effects),
            LifecycleKind::TargetNotFound => self.skip_missing_target(event),
            LifecycleKind::Other => {}
        }
        effects
    }

    fn enter_step(&mut self, step_index: usize, effects: &mut Vec<TourEffect>) {
        // Stray callbacks after a reset must not move the cursor or reopen panels.
        if !self.state.running {
            debug!(step_index, "ignoring step callback while the tour is not running");
            return;
        }
        self.state.cursor = step_index;
        let region = self.side_effects.iter().position(|s| s.covers(step_index));
        if region == self.entered_region {
            return;
        }
        self.leave_region(effects);
        if let Some(index) = region {
            let side_effect = &self.side_effects[index];
            debug!(
                region = %side_effect.region,
                step_index,
                "entering tour side-effect region"
            );
            effects.push(TourEffect::Dispatch(side_effect.on_enter.clone()));
            self.entered_region = Some(index);
        }
    }

    fn leave_region(&mut self, effects: &mut Vec<TourEffect>) {
        let Some(index) = self.entered_region.take() else {
            return;
        };
        if let Some(on_exit) = self.side_effects[index].on_exit.clone() {
            effects.push(TourEffect::Dispatch(on_exit));
        }
    }

    fn reset(&mut self, effects: &mut Vec<TourEffect>) {
        self.leave_region(effects);
        self.clear_state();
        self.phase = TourPhase::Idle;
        effects.push(TourEffect::ResetRenderer);
        info!("tour closed");
    }

    fn clear_state(&mut self) {
        self.state = TourState {
            show_skip_button: self.state.show_skip_button,
            ..TourState::default()
        };
    }

    fn skip_missing_target(&mut self, event: LifecycleEvent) {
        if !self.state.running {
            debug!(
                step_index = event.step_index,
                "ignoring missing target while the tour is not running"
            );
            return;
        }
        if event.action == LifecycleAction::Back {
            self.state.cursor = event.step_index.saturating_sub(1);
            self.state.auto_start = true;
        } else {
            self.state.cursor = event.step_index + 1;
            self.state.auto_start = !event.action.is_dismissal();
        }
        self.phase = if self.state.auto_start {
            TourPhase::Active
        } else {
            TourPhase::Paused
        };
        debug!(
            step_index = event.step_index,
            cursor = self.state.cursor,
            auto_start = self.state.auto_start,
            "tour target not found; moved cursor"
        );
    }
}
