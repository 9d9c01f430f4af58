use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use super::{AnchorPosition, StepSideEffect, TourStep};
use crate::store::Action;

/// Expander wrapping the project-creation form.
pub const PROJECT_PANEL_EXPANDER: &str = "newProjectExpander";

#[derive(Debug, Error)]
pub enum TourConfigError {
    #[error("failed to read tour definition '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid tour definition: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("tour definition has no steps")]
    Empty,
}

#[derive(Deserialize)]
struct TourDefinition {
    #[serde(default)]
    steps: Vec<TourStep>,
}

pub fn default_steps() -> Vec<TourStep> {
    vec![
        TourStep::new(
            "Welcome! This short tour walks you through building your first classifier.",
            "#cesium-logo",
            AnchorPosition::Bottom,
        ),
        TourStep::new(
            "Everything lives in a project. Give your new project a name...",
            "#newProjectForm input[name='Project Name']",
            AnchorPosition::Right,
        ),
        TourStep::new(
            "...and a short description, then create it.",
            "#newProjectForm textarea[name='Description/notes']",
            AnchorPosition::Right,
        ),
        TourStep::new(
            "Upload time series here: a header file with labels plus a tarball of series.",
            "#tab-datasets",
            AnchorPosition::Bottom,
        ),
        TourStep::new(
            "Pick the features to compute for a dataset.",
            "#tab-features",
            AnchorPosition::Bottom,
        ),
        TourStep::new(
            "Train a model on a computed feature set.",
            "#tab-models",
            AnchorPosition::Bottom,
        ),
        TourStep::new(
            "Use a trained model to predict classes for new data.",
            "#tab-predict",
            AnchorPosition::Bottom,
        ),
        TourStep::new(
            "That's it! You can restart this tour at any time.",
            "#tour-button",
            AnchorPosition::Left,
        ),
    ]
}

/// Steps 1 and 2 are anchored inside the project-creation panel.
pub fn default_side_effects() -> Vec<StepSideEffect> {
    vec![StepSideEffect {
        region: "project creation panel".into(),
        steps: BTreeSet::from([1, 2]),
        on_enter: Action::toggle_expander(PROJECT_PANEL_EXPANDER),
        on_exit: Some(Action::hide_expander(PROJECT_PANEL_EXPANDER)),
    }]
}

/// Parses `[[steps]]` tables with `text`, `selector` and `position`.
pub fn parse_tour_steps(raw: &str) -> Result<Vec<TourStep>, TourConfigError> {
    let definition: TourDefinition = toml::from_str(raw)?;
    if definition.steps.is_empty() {
        return Err(TourConfigError::Empty);
    }
    Ok(definition.steps)
}

pub fn load_tour_steps(path: &Path) -> Result<Vec<TourStep>, TourConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| TourConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_tour_steps(&raw)
}
