use super::{ApiError, QueueSource};
use crate::core::models::{ApiEnvelope, Priority, QueueSnapshot, TriggerOutcome, TriggerRequest};
use crate::core::settings::ApiSettings;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

const USER_AGENT: &str = concat!("gradewatch/", env!("CARGO_PKG_VERSION"));

/// Client for the review service's analysis endpoints.
#[derive(Clone)]
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    settings: ApiSettings,
}

impl HttpAnalysisClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            settings: settings.clone(),
        })
    }

    pub fn report_url(&self, task_id: &str) -> String {
        self.settings.report_url(task_id)
    }

    /// Asks the service to queue an analysis run for `task_id`.
    pub async fn trigger(
        &self,
        task_id: &str,
        priority: Priority,
    ) -> Result<TriggerOutcome, ApiError> {
        let url = self.settings.trigger_url(task_id);
        tracing::debug!(%url, ?priority, "Triggering analysis");

        let request = self.authorize(self.client.post(&url));
        let response = request.json(&TriggerRequest { priority }).send().await?;

        read_envelope(response).await
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.settings.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl QueueSource for HttpAnalysisClient {
    async fn fetch_queue(&self) -> Result<QueueSnapshot, ApiError> {
        let url = self.settings.queue_url();
        let response = self.authorize(self.client.get(&url)).send().await?;

        read_envelope(response).await
    }
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    decode_envelope(status, &body)
}

fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ApiError> {
    if !status.is_success() {
        // Error responses may still carry the standard envelope.
        if let Ok(envelope) = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body) {
            if !envelope.success {
                return Err(ApiError::Server(envelope.error));
            }
        }
        return Err(ApiError::Status {
            status,
            body: body.to_string(),
        });
    }

    let envelope: ApiEnvelope<T> = serde_json::from_str(body)?;
    envelope.into_result()
}
