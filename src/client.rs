use chrono::Utc;
use futures_util::StreamExt;
use tracing::{debug, error, info};

use crate::chat::ChatTurn;
use crate::errors::ChatError;
use crate::health::{HealthStatus, HEALTH_TIMEOUT};
use crate::models::{ChatMessage, GenerateRequest, GenerateResponse, HealthResponse};

/// HTTP client for the local inference server's `/api/health` and `/api/generate`.
#[derive(Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `/api/health` with a 3 s timeout.
    pub async fn check_health(&self) -> Result<HealthResponse, ChatError> {
        let url = format!("{}/api/health", self.base_url);
        let response = self
            .http
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(&url, e))?;
        if !status.is_success() {
            return Err(ChatError::ServerStatus { status: status.as_u16(), body });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Health check folded into a status; never fails.
    pub async fn health(&self) -> HealthStatus {
        match self.check_health().await {
            Ok(response) => HealthStatus::from_response(&response),
            Err(e) if e.is_transport() => {
                debug!("Health check failed: {e}");
                HealthStatus::Offline
            }
            Err(e) => {
                debug!("Health check returned an error: {e}");
                HealthStatus::Error
            }
        }
    }

    /// POST `/api/generate` without streaming and return the generated text.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<String, ChatError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest { stream: false, ..request.clone() };
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(&url, e))?;
        if !status.is_success() {
            return Err(ChatError::ServerStatus { status: status.as_u16(), body });
        }
        let parsed: GenerateResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_text().unwrap_or_default())
    }

    /// POST `/api/generate` with streaming and drive `turn` to completion.
    ///
    /// `publish` sees the message list after every token event. `is_cancelled` is checked
    /// before each body read; once it returns true the body is dropped and the reply is
    /// finalized from what arrived so far. Failures never escape: they become the reply.
    pub async fn stream_turn<C, P>(
        &self,
        mut turn: ChatTurn,
        request: &GenerateRequest,
        is_cancelled: C,
        mut publish: P,
    ) -> Vec<ChatMessage>
    where
        C: Fn() -> bool,
        P: FnMut(&[ChatMessage]),
    {
        let url = format!("{}/api/generate", self.base_url);
        let response = match self.http.post(&url).json(request).send().await {
            Ok(response) => response,
            Err(e) => {
                let err = self.transport_error(&url, e);
                error!("Generation request for session {} failed: {err}", turn.session_id());
                return turn.fail(&err);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ChatError::ServerStatus { status: status.as_u16(), body };
            error!("Generation request for session {} rejected: {err}", turn.session_id());
            return turn.fail(&err);
        }

        let mut body = response.bytes_stream();
        loop {
            if is_cancelled() {
                info!("Releasing stream for session {}", turn.session_id());
                break;
            }
            match body.next().await {
                Some(Ok(bytes)) => {
                    turn.feed(&bytes, Utc::now(), &mut publish);
                    if turn.is_done() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    let err = ChatError::StreamRead(e.to_string());
                    error!("Stream for session {} broke off: {err}", turn.session_id());
                    return turn.fail(&err);
                }
                None => break,
            }
        }
        turn.finish(Utc::now())
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> ChatError {
        if e.is_timeout() {
            ChatError::Timeout { endpoint: url.to_string() }
        } else {
            ChatError::ServerUnavailable { host: self.base_url.clone(), message: e.to_string() }
        }
    }
}
