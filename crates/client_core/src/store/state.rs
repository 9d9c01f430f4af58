use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use shared::domain::{ArtifactSummary, Collection, Notification, Project, ProjectId};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectsState {
    pub project_list: Vec<Project>,
    pub selected_id: Option<ProjectId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetsState {
    pub dataset_list: Vec<ArtifactSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeaturesetsState {
    pub featureset_list: Vec<ArtifactSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelsState {
    pub model_list: Vec<ArtifactSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictionsState {
    pub prediction_list: Vec<ArtifactSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MiscState {
    pub logo_spin_angle: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppState {
    pub projects: ProjectsState,
    pub datasets: DatasetsState,
    pub featuresets: FeaturesetsState,
    pub models: ModelsState,
    pub predictions: PredictionsState,
    pub misc: MiscState,
    pub expanders: BTreeSet<String>,
    pub notifications: Vec<Notification>,
    /// Latest reported percentage per pipeline stage.
    pub progress: BTreeMap<String, u8>,
    /// Collections the server asked us to refetch.
    pub stale: BTreeSet<Collection>,
    pub hydrated: bool,
}

impl AppState {
    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanders.contains(id)
    }

    pub fn artifacts(&self, collection: Collection) -> &[ArtifactSummary] {
        match collection {
            Collection::Projects => &[],
            Collection::Datasets => &self.datasets.dataset_list,
            Collection::Featuresets => &self.featuresets.featureset_list,
            Collection::Models => &self.models.model_list,
            Collection::Predictions => &self.predictions.prediction_list,
        }
    }
}
