use gloo_net::http::Request;
use gloo_timers::callback::Timeout;
use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, ReadableStreamDefaultReader};

use thinkchat::ChatError;
use thinkchat::health::{HEALTH_TIMEOUT, HealthStatus};
use thinkchat::models::{GenerateRequest, HealthResponse};

/// Base URL of the local inference server.
pub const API_BASE: &str = "http://127.0.0.1:5000";

/// GET `/api/health`, aborted after 3 s. Never fails: problems map to a status.
pub async fn fetch_health() -> HealthStatus {
    let controller = AbortController::new().ok();
    let signal = controller.as_ref().map(|c| c.signal());
    // Dropping the timer cancels it, so it only fires while the request is pending
    let _deadline = controller
        .clone()
        .map(|c| Timeout::new(HEALTH_TIMEOUT.as_millis() as u32, move || c.abort()));

    let resp = match Request::get(&format!("{API_BASE}/api/health"))
        .abort_signal(signal.as_ref())
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            log::debug!("Health check failed: {e}");
            return HealthStatus::Offline;
        }
    };

    if !resp.ok() {
        log::debug!("Health check returned {}", resp.status());
        return HealthStatus::Error;
    }

    match resp.json::<HealthResponse>().await {
        Ok(health) => HealthStatus::from_response(&health),
        Err(e) => {
            log::debug!("Unreadable health response: {e}");
            HealthStatus::Error
        }
    }
}

/// Open a streaming generation request and hand back its body reader.
pub async fn open_stream(request: &GenerateRequest) -> Result<StreamReader, ChatError> {
    let resp = Request::post(&format!("{API_BASE}/api/generate"))
        .json(request)
        .map_err(|e| ChatError::StreamRead(format!("Serialize error: {e}")))?
        .send()
        .await
        .map_err(|e| ChatError::ServerUnavailable {
            host: API_BASE.to_string(),
            message: e.to_string(),
        })?;

    if !resp.ok() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(ChatError::ServerStatus { status, body });
    }

    let body = resp
        .body()
        .ok_or_else(|| ChatError::StreamRead("response has no body".to_string()))?;
    let reader = body
        .get_reader()
        .dyn_into::<ReadableStreamDefaultReader>()
        .map_err(|e| js_error(e.into()))?;
    Ok(StreamReader { reader })
}

/// Byte reader over a fetch response body.
pub struct StreamReader {
    reader: ReadableStreamDefaultReader,
}

impl StreamReader {
    /// Next body chunk, or `None` once the body is exhausted.
    pub async fn next_chunk(&self) -> Result<Option<Vec<u8>>, ChatError> {
        let result = JsFuture::from(self.reader.read()).await.map_err(js_error)?;
        let done = Reflect::get(&result, &JsValue::from_str("done"))
            .map_err(js_error)?
            .as_bool()
            .unwrap_or(true);
        if done {
            return Ok(None);
        }
        let value = Reflect::get(&result, &JsValue::from_str("value")).map_err(js_error)?;
        Ok(Some(Uint8Array::new(&value).to_vec()))
    }

    /// Stop reading and let the browser close the connection.
    pub fn release(self) {
        let _ = self.reader.cancel();
    }
}

fn js_error(e: JsValue) -> ChatError {
    ChatError::StreamRead(format!("{e:?}"))
}
