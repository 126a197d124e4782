use async_trait::async_trait;
use progress_core::model::{LearnerId, ModuleId};
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::api::ingest;
use crate::api::{DashboardSnapshot, LearnerApi, ProgressOverview, ServerNotification};
use crate::error::ApiError;

/// `LearnerApi` over HTTP/JSON.
#[derive(Clone)]
pub struct HttpLearnerApi {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectionRequest<'a> {
    module_id: &'a str,
}

impl HttpLearnerApi {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Build `{base}/api/{segments...}`, percent-encoding every segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    async fn read_body(response: Response) -> Result<String, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::HttpStatus(status));
        }
        Ok(response.text().await?)
    }

    async fn get(&self, segments: &[&str]) -> Result<String, ApiError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        Self::read_body(response).await
    }
}

#[async_trait]
impl LearnerApi for HttpLearnerApi {
    async fn fetch_dashboard(&self, learner: &LearnerId) -> Result<DashboardSnapshot, ApiError> {
        let body = self.get(&["learner", learner.as_str(), "dashboard"]).await?;
        ingest::parse_dashboard(&body)
    }

    async fn fetch_progress(&self, learner: &LearnerId) -> Result<ProgressOverview, ApiError> {
        let body = self.get(&["learner", learner.as_str(), "progress"]).await?;
        ingest::parse_progress(&body)
    }

    async fn add_module(
        &self,
        learner: &LearnerId,
        module: &ModuleId,
    ) -> Result<Vec<ModuleId>, ApiError> {
        let url = self.endpoint(&["learner", learner.as_str(), "modules", "selection"])?;
        debug!(%url, "POST");
        let response = self
            .client
            .post(url)
            .json(&SelectionRequest {
                module_id: module.as_str(),
            })
            .send()
            .await?;
        let body = Self::read_body(response).await?;
        ingest::parse_active_modules(&body)
    }

    async fn remove_module(
        &self,
        learner: &LearnerId,
        module: &ModuleId,
    ) -> Result<Vec<ModuleId>, ApiError> {
        let url = self.endpoint(&[
            "learner",
            learner.as_str(),
            "modules",
            "selection",
            module.as_str(),
        ])?;
        debug!(%url, "DELETE");
        let response = self.client.delete(url).send().await?;
        let body = Self::read_body(response).await?;
        ingest::parse_active_modules(&body)
    }

    async fn fetch_notifications(
        &self,
        account: &str,
    ) -> Result<Vec<ServerNotification>, ApiError> {
        let body = self.get(&["notifications", account]).await?;
        ingest::parse_notifications(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_encode_segments() {
        let api = HttpLearnerApi::new(Url::parse("https://learn.example/").unwrap());
        let url = api
            .endpoint(&["learner", "ada lovelace", "dashboard"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://learn.example/api/learner/ada%20lovelace/dashboard"
        );
    }

    #[test]
    fn endpoints_keep_a_base_path() {
        let api = HttpLearnerApi::new(Url::parse("https://learn.example/platform/").unwrap());
        let url = api.endpoint(&["notifications", "ada@example.com"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://learn.example/platform/api/notifications/ada@example.com"
        );
    }

    #[test]
    fn cannot_be_a_base_urls_are_rejected() {
        let api = HttpLearnerApi::new(Url::parse("mailto:ada@example.com").unwrap());
        assert!(matches!(
            api.endpoint(&["learner"]),
            Err(ApiError::InvalidUrl(_))
        ));
    }
}
