//! REST reads used to refill collections the server marked stale.

use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{
    domain::{ArtifactSummary, Collection, Project},
    protocol::ApiEnvelope,
};
use tracing::debug;

use crate::{error::ApiClientError, store::Action};

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    server_url: String,
}

impl ApiClient {
    pub fn new(http: Client, server_url: impl Into<String>) -> Self {
        Self {
            http,
            server_url: server_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_envelope<T: DeserializeOwned>(
        &self,
        route: &'static str,
    ) -> Result<T, ApiClientError> {
        let request_failed = |source| ApiClientError::Request { route, source };
        let envelope: ApiEnvelope<T> = self
            .http
            .get(format!("{}{route}", self.server_url))
            .send()
            .await
            .map_err(request_failed)?
            .error_for_status()
            .map_err(request_failed)?
            .json()
            .await
            .map_err(request_failed)?;
        envelope
            .into_result()
            .map_err(|err| ApiClientError::api(route, err))
    }

    pub async fn fetch_projects(&self) -> Result<Vec<Project>, ApiClientError> {
        self.get_envelope(Collection::Projects.route()).await
    }

    pub async fn fetch_artifacts(
        &self,
        collection: Collection,
    ) -> Result<Vec<ArtifactSummary>, ApiClientError> {
        self.get_envelope(collection.route()).await
    }

    /// Fetches `collection` and wraps it in the matching `receive_*` action.
    pub async fn fetch_collection(&self, collection: Collection) -> Result<Action, ApiClientError> {
        let action = match collection {
            Collection::Projects => Action::ReceiveProjects {
                projects: self.fetch_projects().await?,
            },
            Collection::Datasets => Action::ReceiveDatasets {
                items: self.fetch_artifacts(collection).await?,
            },
            Collection::Featuresets => Action::ReceiveFeaturesets {
                items: self.fetch_artifacts(collection).await?,
            },
            Collection::Models => Action::ReceiveModels {
                items: self.fetch_artifacts(collection).await?,
            },
            Collection::Predictions => Action::ReceivePredictions {
                items: self.fetch_artifacts(collection).await?,
            },
        };
        debug!(collection = collection.as_str(), "fetched collection");
        Ok(action)
    }
}
