use serde::{Deserialize, Serialize};
use shared::domain::{ArtifactSummary, Collection, Notification, Progress, Project, ProjectId};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    Hydrate,
    SpinLogo,
    ToggleExpander { id: String },
    HideExpander { id: String },
    Refresh { collection: Collection },
    ReceiveProjects { projects: Vec<Project> },
    ReceiveDatasets { items: Vec<ArtifactSummary> },
    ReceiveFeaturesets { items: Vec<ArtifactSummary> },
    ReceiveModels { items: Vec<ArtifactSummary> },
    ReceivePredictions { items: Vec<ArtifactSummary> },
    ShowNotification { notification: Notification },
    HideNotification { id: Uuid },
    UpdateProgress { progress: Progress },
    SelectProject { id: ProjectId },
}

impl Action {
    pub fn toggle_expander(id: impl Into<String>) -> Self {
        Self::ToggleExpander { id: id.into() }
    }

    pub fn hide_expander(id: impl Into<String>) -> Self {
        Self::HideExpander { id: id.into() }
    }

    pub fn refresh(collection: Collection) -> Self {
        Self::Refresh { collection }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Hydrate => "hydrate",
            Self::SpinLogo => "spin_logo",
            Self::ToggleExpander { .. } => "toggle_expander",
            Self::HideExpander { .. } => "hide_expander",
            Self::Refresh { .. } => "refresh",
            Self::ReceiveProjects { .. } => "receive_projects",
            Self::ReceiveDatasets { .. } => "receive_datasets",
            Self::ReceiveFeaturesets { .. } => "receive_featuresets",
            Self::ReceiveModels { .. } => "receive_models",
            Self::ReceivePredictions { .. } => "receive_predictions",
            Self::ShowNotification { .. } => "show_notification",
            Self::HideNotification { .. } => "hide_notification",
            Self::UpdateProgress { .. } => "update_progress",
            Self::SelectProject { .. } => "select_project",
        }
    }
}
