use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::messages::{
    ExampleDialogue, PartnerReply, RespondRequest, Review, ReviewRequest, ScenarioRequest,
    ScenarioResponse, TranscriptionResponse,
};
use super::PracticeApi;
use crate::config::ApiConfig;
use crate::error::{PracticeError, Result};
use crate::recording::RecordingUnit;
use crate::session::ProficiencyLevel;

/// HTTP client for the practice backend
pub struct HttpPracticeApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpPracticeApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            PracticeError::InvalidState(format!("invalid API base URL {}: {}", config.base_url, e))
        })?;

        info!(
            "Practice backend at {} ({})",
            base_url,
            if config.token.is_some() { "authenticated" } else { "anonymous" }
        );

        Ok(Self {
            client: Client::new(),
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| PracticeError::InvalidState(format!("invalid endpoint {}: {}", path, e)))
    }

    /// Resolve a possibly relative audio URL (`/audio_cache/x.mp3`) against the backend.
    pub fn resolve_audio_url(&self, raw: &str) -> Result<String> {
        self.endpoint(raw).map(String::from)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);
        let response = self
            .authorize(self.client.post(url))
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }
}

/// Map a non-2xx status to `ServerError`, otherwise decode the body.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PracticeError::Server {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait::async_trait]
impl PracticeApi for HttpPracticeApi {
    async fn transcribe(&self, unit: &RecordingUnit) -> Result<String> {
        let url = self.endpoint("/api/transcribe")?;
        debug!(bytes = unit.size_bytes, "Uploading recording for transcription");

        let part = reqwest::multipart::Part::bytes(unit.encoded_audio.clone())
            .file_name(unit.file_name())
            .mime_str(&unit.mime_type)?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = self
            .authorize(self.client.post(url))
            .multipart(form)
            .send()
            .await?;
        let body: TranscriptionResponse = read_json(response).await?;
        Ok(body.transcription)
    }

    async fn respond(&self, request: &RespondRequest) -> Result<PartnerReply> {
        let mut reply: PartnerReply = self.post_json("/api/get_ai_response", request).await?;
        reply.audio_url = match reply.audio_url.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(self.resolve_audio_url(raw)?),
            _ => None,
        };
        Ok(reply)
    }

    async fn generate_scenario(&self, request: &ScenarioRequest) -> Result<String> {
        let body: ScenarioResponse = self.post_json("/api/scenarios/random", request).await?;
        Ok(body.scenario)
    }

    async fn example_dialogue(&self, level: ProficiencyLevel, scenario: &str) -> Result<ExampleDialogue> {
        let request = ScenarioRequest {
            level,
            situation: Some(scenario.to_string()),
        };
        let mut dialogue: ExampleDialogue = self.post_json("/api/example_dialogue", &request).await?;
        if let Some(raw) = dialogue.audio_url.take() {
            dialogue.audio_url = Some(self.resolve_audio_url(&raw)?);
        }
        Ok(dialogue)
    }

    async fn review(&self, request: &ReviewRequest) -> Result<Review> {
        self.post_json("/api/review/performance", request).await
    }
}
