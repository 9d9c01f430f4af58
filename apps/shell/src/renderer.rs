//! Terminal stand-in for the tour overlay.

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
};

use client_core::{RawLifecycle, TourRenderer, TourState, TourStep};
use tokio::sync::mpsc;
use tracing::warn;

/// What the overlay is showing, shared between the renderer and user input.
#[derive(Debug, Default)]
pub struct Overlay {
    steps: Vec<TourStep>,
    state: TourState,
    shown: Option<usize>,
    last_action: &'static str,
    missing: BTreeSet<String>,
}

impl Overlay {
    pub fn new(missing: impl IntoIterator<Item = String>) -> Self {
        Self {
            last_action: "next",
            missing: missing.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Follows the controlled state; shows the cursor step once per change.
    pub fn sync(&mut self, steps: &[TourStep], state: &TourState) -> Vec<RawLifecycle> {
        self.steps = steps.to_vec();
        self.state = *state;
        if !state.running {
            self.shown = None;
            return Vec::new();
        }
        if !state.auto_start || self.shown == Some(state.cursor) {
            return Vec::new();
        }
        self.show(state.cursor, self.last_action)
    }

    pub fn reset(&mut self) {
        self.shown = None;
    }

    pub fn next(&mut self) -> Vec<RawLifecycle> {
        match self.active() {
            Some(index) => self.show(index + 1, "next"),
            None => Vec::new(),
        }
    }

    pub fn back(&mut self) -> Vec<RawLifecycle> {
        match self.active() {
            Some(index) if index > 0 => self.show(index - 1, "back"),
            _ => Vec::new(),
        }
    }

    pub fn skip(&mut self) -> Vec<RawLifecycle> {
        self.active()
            .map(|index| vec![RawLifecycle::new(index, "finished", "skip")])
            .unwrap_or_default()
    }

    pub fn close(&mut self) -> Vec<RawLifecycle> {
        self.active()
            .map(|index| vec![RawLifecycle::new(index, "step:after", "close")])
            .unwrap_or_default()
    }

    /// One-line description of the step on screen.
    pub fn describe(&self) -> Option<String> {
        let index = self.active()?;
        let step = self.steps.get(index)?;
        Some(format!(
            "[tour {}/{}] {} ({} {:?})",
            index + 1,
            self.steps.len(),
            step.text,
            step.selector,
            step.position
        ))
    }

    fn active(&self) -> Option<usize> {
        self.shown.filter(|_| self.state.running)
    }

    fn show(&mut self, index: usize, action: &'static str) -> Vec<RawLifecycle> {
        self.shown = Some(index);
        self.last_action = action;
        let Some(step) = self.steps.get(index) else {
            return vec![RawLifecycle::new(index, "finished", action)];
        };
        if self.missing.contains(&step.selector) {
            return vec![RawLifecycle::new(index, "error:target_not_found", action)];
        }
        vec![RawLifecycle::new(index, "step:before", action)]
    }
}

/// Prints shown steps and forwards callbacks to the runtime.
pub fn deliver(
    overlay: &Overlay,
    events: Vec<RawLifecycle>,
    lifecycle: &mpsc::UnboundedSender<RawLifecycle>,
) {
    for event in events {
        if event.kind == "step:before" {
            if let Some(line) = overlay.describe() {
                println!("{line}");
            }
        }
        if lifecycle.send(event).is_err() {
            warn!("shell runtime stopped; dropping tour callback");
        }
    }
}

pub struct HeadlessRenderer {
    overlay: Arc<Mutex<Overlay>>,
    lifecycle: mpsc::UnboundedSender<RawLifecycle>,
}

impl HeadlessRenderer {
    pub fn new(overlay: Arc<Mutex<Overlay>>, lifecycle: mpsc::UnboundedSender<RawLifecycle>) -> Self {
        Self { overlay, lifecycle }
    }
}

impl TourRenderer for HeadlessRenderer {
    fn render(&mut self, steps: &[TourStep], state: &TourState) {
        let Ok(mut overlay) = self.overlay.lock() else {
            warn!("tour overlay lock poisoned; skipping render");
            return;
        };
        let events = overlay.sync(steps, state);
        deliver(&overlay, events, &self.lifecycle);
    }

    fn reset(&mut self) {
        if let Ok(mut overlay) = self.overlay.lock() {
            overlay.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use client_core::tour::{default_steps, AnchorPosition};

    use super::*;

    fn running(cursor: usize) -> TourState {
        TourState {
            cursor,
            running: true,
            auto_start: true,
            show_skip_button: true,
        }
    }

    fn kinds(events: &[RawLifecycle]) -> Vec<(usize, &str, &str)> {
        events
            .iter()
            .map(|e| (e.index, e.kind.as_str(), e.action.as_str()))
            .collect()
    }

    #[test]
    fn shows_cursor_step_once() {
        let mut overlay = Overlay::new(Vec::new());
        let steps = default_steps();
        assert_eq!(
            kinds(&overlay.sync(&steps, &running(0))),
            vec![(0, "step:before", "next")]
        );
        assert!(overlay.sync(&steps, &running(0)).is_empty());
        assert!(overlay.describe().expect("step").starts_with("[tour 1/8]"));
    }

    #[test]
    fn idle_or_paused_tour_shows_nothing() {
        let mut overlay = Overlay::new(Vec::new());
        let steps = default_steps();
        assert!(overlay.sync(&steps, &TourState::default()).is_empty());

        let paused = TourState {
            auto_start: false,
            ..running(2)
        };
        assert!(overlay.sync(&steps, &paused).is_empty());
        assert!(overlay.next().is_empty());
    }

    #[test]
    fn navigation_emits_controlled_callbacks() {
        let mut overlay = Overlay::new(Vec::new());
        let steps = default_steps();
        overlay.sync(&steps, &running(1));

        assert_eq!(kinds(&overlay.next()), vec![(2, "step:before", "next")]);
        assert_eq!(kinds(&overlay.back()), vec![(1, "step:before", "back")]);
        assert_eq!(kinds(&overlay.close()), vec![(1, "step:after", "close")]);
        assert_eq!(kinds(&overlay.skip()), vec![(1, "finished", "skip")]);
    }

    #[test]
    fn missing_selector_reports_target_not_found() {
        let steps = vec![
            TourStep::new("a", "#a", AnchorPosition::Top),
            TourStep::new("b", "#gone", AnchorPosition::Top),
        ];
        let mut overlay = Overlay::new(vec!["#gone".to_string()]);
        overlay.sync(&steps, &running(0));
        assert_eq!(
            kinds(&overlay.next()),
            vec![(1, "error:target_not_found", "next")]
        );
    }

    #[test]
    fn cursor_past_last_step_finishes() {
        let steps = vec![TourStep::new("only", "#a", AnchorPosition::Left)];
        let mut overlay = Overlay::new(Vec::new());
        assert_eq!(
            kinds(&overlay.sync(&steps, &running(1))),
            vec![(1, "finished", "next")]
        );
    }

    #[test]
    fn reset_allows_the_same_step_to_show_again() {
        let mut overlay = Overlay::new(Vec::new());
        let steps = default_steps();
        overlay.sync(&steps, &running(0));
        overlay.reset();
        assert_eq!(overlay.sync(&steps, &running(0)).len(), 1);
    }
}
