use digest_core::payload::{
    AskRequest, AskResponse, ChatHistoryResponse, VideosResponse,
};
use digest_core::{ChatMessage, JobStatusResponse, Video};
use serde::de::DeserializeOwned;
use url::Url;

use crate::types::map_reqwest_error;
use crate::{ApiError, ClientSettings, FailureKind};

/// One-shot requests against the digest server.
#[async_trait::async_trait]
pub trait DigestApi: Send + Sync {
    async fn fetch_job_status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError>;

    /// Registers a question. Resolves only once the server accepted it.
    async fn ask_question(&self, chat_id: &str, question: &str) -> Result<(), ApiError>;

    async fn fetch_chat_history(&self, chat_id: &str) -> Result<Vec<ChatMessage>, ApiError>;

    async fn fetch_videos(&self) -> Result<Vec<Video>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestApi {
    client: reqwest::Client,
    settings: ClientSettings,
}

impl ReqwestApi {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        let body = response.text().await.map_err(map_reqwest_error)?;
        serde_json::from_str(&body).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::read_json(response).await
    }
}

#[async_trait::async_trait]
impl DigestApi for ReqwestApi {
    async fn fetch_job_status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError> {
        self.get_json(self.settings.job_status_url(job_id)?).await
    }

    async fn ask_question(&self, chat_id: &str, question: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.settings.chat_ask_url(chat_id)?)
            .json(&AskRequest { question })
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let answer: AskResponse = Self::read_json(response).await?;
        if answer.success {
            Ok(())
        } else {
            Err(ApiError::new(
                FailureKind::Rejected,
                answer
                    .message
                    .unwrap_or_else(|| "Failed to ask question".to_string()),
            ))
        }
    }

    async fn fetch_chat_history(&self, chat_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        let history: ChatHistoryResponse = self.get_json(self.settings.chat_url(chat_id)?).await?;
        Ok(history.messages)
    }

    async fn fetch_videos(&self) -> Result<Vec<Video>, ApiError> {
        let videos: VideosResponse = self.get_json(self.settings.jobs_url()?).await?;
        Ok(videos.videos)
    }
}
