use serde::Deserialize;

use super::TourState;

/// Externally supplied tour settings; unset fields defer to the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TourOverrides {
    pub cursor: Option<usize>,
    pub running: Option<bool>,
    pub auto_start: Option<bool>,
    pub show_skip_button: Option<bool>,
}

/// Effective state handed to the renderer: `external` wins where present.
pub fn resolve(external: &TourOverrides, internal: &TourState) -> TourState {
    TourState {
        cursor: external.cursor.unwrap_or(internal.cursor),
        running: external.running.unwrap_or(internal.running),
        auto_start: external.auto_start.unwrap_or(internal.auto_start),
        show_skip_button: external
            .show_skip_button
            .unwrap_or(internal.show_skip_button),
    }
}
