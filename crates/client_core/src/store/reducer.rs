use shared::domain::Collection;
use tracing::debug;

use super::{Action, AppState};

const LOGO_SPIN_STEP: u16 = 90;
const MAX_NOTIFICATIONS: usize = 16;

pub fn reduce(state: &mut AppState, action: &Action) {
    match action {
        Action::Hydrate => {
            state.stale.extend(Collection::ALL);
            state.hydrated = false;
        }
        Action::SpinLogo => {
            state.misc.logo_spin_angle = (state.misc.logo_spin_angle + LOGO_SPIN_STEP) % 360;
        }
        Action::ToggleExpander { id } => {
            if !state.expanders.remove(id) {
                state.expanders.insert(id.clone());
            }
        }
        Action::HideExpander { id } => {
            state.expanders.remove(id);
        }
        Action::Refresh { collection } => {
            state.stale.insert(*collection);
        }
        Action::ReceiveProjects { projects } => {
            state.projects.project_list = projects.clone();
            mark_fresh(state, Collection::Projects);
        }
        Action::ReceiveDatasets { items } => {
            state.datasets.dataset_list = items.clone();
            mark_fresh(state, Collection::Datasets);
        }
        Action::ReceiveFeaturesets { items } => {
            state.featuresets.featureset_list = items.clone();
            mark_fresh(state, Collection::Featuresets);
        }
        Action::ReceiveModels { items } => {
            state.models.model_list = items.clone();
            mark_fresh(state, Collection::Models);
        }
        Action::ReceivePredictions { items } => {
            state.predictions.prediction_list = items.clone();
            mark_fresh(state, Collection::Predictions);
        }
        Action::ShowNotification { notification } => {
            state.notifications.push(notification.clone());
            if state.notifications.len() > MAX_NOTIFICATIONS {
                let overflow = state.notifications.len() - MAX_NOTIFICATIONS;
                state.notifications.drain(..overflow);
            }
        }
        Action::HideNotification { id } => {
            state.notifications.retain(|n| n.id != *id);
        }
        Action::UpdateProgress { progress } => {
            state
                .progress
                .insert(progress.stage.clone(), progress.pct.min(100));
        }
        Action::SelectProject { id } => {
            state.projects.selected_id = (!id.is_empty()).then(|| id.clone());
        }
    }
}

fn mark_fresh(state: &mut AppState, collection: Collection) {
    state.stale.remove(&collection);
    if !state.hydrated && state.stale.is_empty() {
        debug!("store hydrated");
        state.hydrated = true;
    }
}
