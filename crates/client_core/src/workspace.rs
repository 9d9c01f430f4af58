//! Derived views over the project list.

use shared::domain::{Project, ProjectId};

use crate::store::AppState;

/// Project the workspace is showing.
///
/// The first project whose id equals `selected_id`; otherwise the first
/// project in the list; otherwise an empty placeholder.
pub fn derive_selected_project(project_list: &[Project], selected_id: Option<&ProjectId>) -> Project {
    selected_id
        .and_then(|id| project_list.iter().find(|project| project.id == *id))
        .or_else(|| project_list.first())
        .cloned()
        .unwrap_or_else(Project::placeholder)
}

pub fn selected_project(state: &AppState) -> Project {
    derive_selected_project(
        &state.projects.project_list,
        state.projects.selected_id.as_ref(),
    )
}

pub fn workspace_tabs_enabled(state: &AppState) -> bool {
    !selected_project(state).id.is_empty()
}
