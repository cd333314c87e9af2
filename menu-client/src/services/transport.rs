//! HTTP transport for the menu API.
//!
//! Every call attaches the bearer token from the injected [`TokenProvider`]
//! (when it has one) plus correlation headers, and every failure comes back
//! as an [`ApiError`] envelope.

use bytes::Bytes;
use client_core::observability::{extract_request_id, inject_trace_headers, new_request_id};
use futures::stream;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::config::ApiSettings;
use crate::error::ApiError;
use crate::models::FilePart;
use crate::services::token::TokenProvider;

const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// One event of a multipart upload.
///
/// A stream yields zero or more non-decreasing `Progress` values followed by
/// exactly one `Completed` or `Failed`, then ends.
#[derive(Debug)]
pub enum UploadEvent<T> {
    Progress(u8),
    Completed(T),
    Failed(ApiError),
}

pub type UploadEvents<T> = UnboundedReceiverStream<UploadEvent<T>>;

#[derive(Clone)]
pub struct Transport {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    upload_timeout: Duration,
    chunk_size: usize,
    tokens: Arc<dyn TokenProvider>,
}

impl Transport {
    pub fn new(settings: &ApiSettings, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            upload_timeout: Duration::from_secs(settings.upload_timeout_secs),
            chunk_size: settings.upload_chunk_size.max(1),
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer token (if any) and correlation headers.
    async fn authorize(&self, builder: RequestBuilder) -> (RequestBuilder, String) {
        let request_id = new_request_id();
        let mut headers = HeaderMap::new();
        inject_trace_headers(&mut headers, &request_id);

        let builder = builder.headers(headers);
        let builder = match self.tokens.access_token().await {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        };

        (builder, request_id)
    }

    /// JSON request/response call.
    ///
    /// Non-JSON success responses deserialize `T` from `null`, which covers
    /// `()` and `Option<_>` for no-content endpoints.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
        headers: Option<HeaderMap>,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut builder = self
            .client
            .request(method.clone(), &url)
            .timeout(self.request_timeout);

        if let Some(headers) = headers {
            builder = builder.headers(headers);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let (builder, request_id) = self.authorize(builder).await;

        let response = builder.send().await.map_err(|e| {
            tracing::error!(%method, %url, %request_id, error = %e, "Request failed to send");
            network_error(&e)
        })?;

        let server_request_id = extract_request_id(response.headers());
        tracing::debug!(
            %method,
            %url,
            %request_id,
            server_request_id = server_request_id.as_deref().unwrap_or("-"),
            status = %response.status(),
            "Response received"
        );
        read_json_response(response).await
    }

    /// Multipart POST without progress reporting, for small one-shot forms.
    ///
    /// Part `i` is sent under the field name `field_name(i)`.
    pub async fn request_multipart<T, F>(
        &self,
        path: &str,
        parts: Vec<FilePart>,
        field_name: F,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(usize) -> String,
    {
        let url = self.url(path);
        let mut form = Form::new();
        for (index, part) in parts.into_iter().enumerate() {
            let len = part.data.len() as u64;
            let body = Body::from(part.data);
            form = form.part(field_name(index), file_part(body, len, part.file_name, &part.media_type)?);
        }

        let builder = self
            .client
            .post(&url)
            .timeout(self.upload_timeout)
            .multipart(form);
        let (builder, request_id) = self.authorize(builder).await;

        let response = builder.send().await.map_err(|e| {
            tracing::error!(%url, %request_id, error = %e, "Multipart request failed to send");
            network_error(&e)
        })?;

        read_json_response(response).await
    }

    /// Multipart POST that reports byte progress as an event stream.
    ///
    /// Every part goes under the same repeated `field`. The upload runs on a
    /// spawned task, so this must be called inside a Tokio runtime. Cancelling
    /// `cancel` ends the stream with a `Failed` event carrying a cancelled error.
    pub fn upload_multipart<T>(
        &self,
        path: &str,
        field: &str,
        parts: Vec<FilePart>,
        cancel: CancellationToken,
    ) -> UploadEvents<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let total = parts.iter().map(|p| p.data.len() as u64).sum();
        let sink = ProgressSink::new(tx, total);

        let transport = self.clone();
        let url = self.url(path);
        let field = field.to_string();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!(%url, "Upload cancelled");
                    Err(ApiError::cancelled("Upload cancelled"))
                }
                result = transport.send_upload::<T>(&url, &field, parts, sink.clone()) => result,
            };
            sink.finish(outcome);
        });

        UnboundedReceiverStream::new(rx)
    }

    async fn send_upload<T: DeserializeOwned + Send + 'static>(
        &self,
        url: &str,
        field: &str,
        parts: Vec<FilePart>,
        sink: ProgressSink<T>,
    ) -> Result<T, ApiError> {
        let file_count = parts.len();
        let mut form = Form::new();
        for part in parts {
            let len = part.data.len() as u64;
            let body = progress_body(part.data, self.chunk_size, sink.clone());
            form = form.part(field.to_string(), file_part(body, len, part.file_name, &part.media_type)?);
        }

        let builder = self
            .client
            .post(url)
            .timeout(self.upload_timeout)
            .multipart(form);
        let (builder, request_id) = self.authorize(builder).await;

        tracing::info!(%url, %request_id, file_count, "Starting multipart upload");

        let response = builder.send().await.map_err(|e| {
            tracing::error!(%url, %request_id, error = %e, "Upload failed to send");
            network_error(&e)
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| network_error(&e))?;

        if !status.is_success() {
            let fallback = format!("Upload failed ({})", status.as_u16());
            let error = match serde_json::from_slice::<Value>(&body) {
                Ok(data) => error_from_body(&data, status, &fallback),
                Err(_) => ApiError::http(fallback, status.as_u16()),
            };
            tracing::error!(%url, %request_id, status = %status, error = %error, "Upload rejected");
            return Err(error);
        }

        serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(%url, %request_id, error = %e, "Upload response could not be parsed");
            ApiError::malformed("Failed to process server response", status.as_u16())
        })
    }
}

fn network_error(err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::network(format!("Request timed out: {}", err))
    } else {
        ApiError::network(format!("Network error: {}", err))
    }
}

fn file_part(body: Body, len: u64, file_name: String, media_type: &str) -> Result<Part, ApiError> {
    Part::stream_with_length(body, len)
        .file_name(file_name)
        .mime_str(media_type)
        .map_err(|e| ApiError::invalid_request(format!("Invalid media type '{}': {}", media_type, e)))
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"))
}

async fn read_json_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();

    if !is_json(&response) {
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("Unknown status");
            return Err(ApiError::http(format!("HTTP error: {}", reason), status.as_u16()));
        }
        return serde_json::from_value(Value::Null).map_err(|_| {
            ApiError::malformed("Expected a JSON response body", status.as_u16())
        });
    }

    let body = response.bytes().await.map_err(|e| network_error(&e))?;
    let data = match parse_body(&body) {
        Ok(data) => data,
        Err(e) if status.is_success() => {
            tracing::error!(error = %e, "Response body is not valid JSON");
            return Err(ApiError::malformed("Failed to parse server response", status.as_u16()));
        }
        Err(_) => return Err(ApiError::http(GENERIC_ERROR_MESSAGE, status.as_u16())),
    };

    if !status.is_success() {
        return Err(error_from_body(&data, status, GENERIC_ERROR_MESSAGE));
    }

    serde_json::from_value(data).map_err(|e| {
        tracing::error!(error = %e, "Response body does not match the expected shape");
        ApiError::malformed("Failed to parse server response", status.as_u16())
    })
}

fn parse_body(body: &Bytes) -> Result<Value, serde_json::Error> {
    if body.is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_slice(body)
    }
}

/// Build the envelope from a failure body.
///
/// An embedded `error` object wins; otherwise a `message` or `detail` string
/// is used, then `fallback`. The status is always the response status.
fn error_from_body(data: &Value, status: StatusCode, fallback: &str) -> ApiError {
    let status = status.as_u16();

    match data.get("error") {
        Some(Value::Object(embedded)) => {
            let message = embedded
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(GENERIC_ERROR_MESSAGE);
            let mut error = ApiError::http(message, status);
            if let Some(code) = embedded.get("code").and_then(Value::as_str) {
                error = error.with_code(code);
            }
            if let Some(Value::Object(details)) = embedded.get("details") {
                error = error.with_details(details.clone());
            }
            return error;
        }
        Some(Value::String(message)) => return ApiError::http(message.as_str(), status),
        _ => {}
    }

    if let Some(message) = data.get("message").and_then(Value::as_str) {
        return ApiError::http(message, status);
    }

    match data.get("detail") {
        Some(Value::String(detail)) => ApiError::http(detail.as_str(), status),
        // Request validation failures carry a list of field errors.
        Some(detail) => {
            let mut details = Map::new();
            details.insert("detail".to_string(), detail.clone());
            ApiError::http(fallback, status).with_details(details)
        }
        None => ApiError::http(fallback, status),
    }
}

/// Shared progress state for one upload.
///
/// Emission and the terminal event happen under one lock, so no progress
/// can be observed after `finish`.
struct ProgressSink<T> {
    inner: Arc<Mutex<SinkState<T>>>,
}

struct SinkState<T> {
    tx: Option<mpsc::UnboundedSender<UploadEvent<T>>>,
    sent: u64,
    total: u64,
    last: u8,
}

impl<T> Clone for ProgressSink<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> ProgressSink<T> {
    fn new(tx: mpsc::UnboundedSender<UploadEvent<T>>, total: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SinkState {
                tx: Some(tx),
                sent: 0,
                total,
                last: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SinkState<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn advance(&self, bytes: u64) {
        let mut state = self.state();
        if state.tx.is_none() || state.total == 0 {
            return;
        }

        state.sent = (state.sent + bytes).min(state.total);
        let percent = ((state.sent as f64 / state.total as f64) * 100.0).round() as u8;
        if percent > state.last {
            state.last = percent;
            if let Some(tx) = &state.tx {
                let _ = tx.send(UploadEvent::Progress(percent));
            }
        }
    }

    fn finish(&self, outcome: Result<T, ApiError>) {
        let mut state = self.state();
        if let Some(tx) = state.tx.take() {
            let event = match outcome {
                Ok(value) => UploadEvent::Completed(value),
                Err(error) => UploadEvent::Failed(error),
            };
            let _ = tx.send(event);
        }
    }
}

/// Body that reports each chunk to `sink` as the HTTP client pulls it.
fn progress_body<T: Send + 'static>(data: Bytes, chunk_size: usize, sink: ProgressSink<T>) -> Body {
    let len = data.len();
    let chunks: Vec<Bytes> = (0..len)
        .step_by(chunk_size)
        .map(|start| data.slice(start..(start + chunk_size).min(len)))
        .collect();

    let chunks = stream::iter(chunks.into_iter().map(move |chunk| {
        sink.advance(chunk.len() as u64);
        Ok::<_, std::io::Error>(chunk)
    }));

    Body::wrap_stream(chunks)
}
