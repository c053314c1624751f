//! `RemoteImageService` backed by the fal.ai queue and storage APIs.

use std::thread;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cutsheet_contracts::request::{GenerationRequest, UpscaleRequest};
use cutsheet_contracts::{CutsheetError, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::config::{ClientConfig, UploadMode};
use crate::remote::RemoteImageService;

const ERROR_BODY_MAX_CHARS: usize = 512;

pub struct FalClient {
    config: ClientConfig,
    http: HttpClient,
}

/// Handle returned by a queue submission.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueTicket {
    request_id: String,
    status_url: String,
    response_url: String,
}

impl FalClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|err| CutsheetError::config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        let trimmed = endpoint.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return trimmed.to_string();
        }
        format!(
            "{}/{}",
            self.config.queue_base,
            trimmed.trim_start_matches('/')
        )
    }

    /// Submit `payload` to `endpoint` and block until the job's result payload
    /// is available or `deadline` passes.
    fn run_job(&self, endpoint: &str, payload: &Value, deadline: Duration) -> Result<Value> {
        let api_key = self.config.require_api_key()?;
        let url = self.endpoint_url(endpoint);
        let started = Instant::now();

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Key {api_key}"))
            .json(payload)
            .send()
            .map_err(|err| transport_error(endpoint, err, self.config.http_timeout))?;
        let submitted = response_json_or_error(endpoint, response)?;

        // Synchronous endpoints answer with the result directly.
        let Some(ticket) = self.queue_ticket(endpoint, &submitted) else {
            return Ok(submitted);
        };
        self.wait_for_completion(endpoint, &ticket, api_key, started, deadline)?;

        let response = self
            .http
            .get(&ticket.response_url)
            .header(AUTHORIZATION, format!("Key {api_key}"))
            .send()
            .map_err(|err| transport_error(endpoint, err, self.config.http_timeout))?;
        response_json_or_error(endpoint, response)
    }

    fn queue_ticket(&self, endpoint: &str, submitted: &Value) -> Option<QueueTicket> {
        let request_id = submitted
            .get("request_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())?
            .to_string();
        if submitted.get("status_url").is_none() && !extract_image_urls(submitted).is_empty() {
            return None;
        }
        let base = format!(
            "{}/{}/requests/{}",
            self.config.queue_base,
            app_id(endpoint),
            request_id
        );
        let url_field = |key: &str| {
            submitted
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Some(QueueTicket {
            status_url: url_field("status_url").unwrap_or_else(|| format!("{base}/status")),
            response_url: url_field("response_url").unwrap_or(base),
            request_id,
        })
    }

    fn wait_for_completion(
        &self,
        endpoint: &str,
        ticket: &QueueTicket,
        api_key: &str,
        started: Instant,
        deadline: Duration,
    ) -> Result<()> {
        loop {
            let response = self
                .http
                .get(&ticket.status_url)
                .header(AUTHORIZATION, format!("Key {api_key}"))
                .send()
                .map_err(|err| transport_error(endpoint, err, self.config.http_timeout))?;
            let status_payload = response_json_or_error(endpoint, response)?;
            match queue_state(&status_payload) {
                QueueState::Completed => return Ok(()),
                QueueState::Failed => {
                    return Err(CutsheetError::network(format!(
                        "{endpoint} job {} failed: {}",
                        ticket.request_id,
                        truncate_text(&status_payload.to_string(), ERROR_BODY_MAX_CHARS)
                    )));
                }
                QueueState::Pending => {}
            }
            let elapsed = started.elapsed();
            if elapsed >= deadline {
                return Err(CutsheetError::Timeout {
                    what: endpoint.to_string(),
                    seconds: deadline.as_secs_f64(),
                });
            }
            thread::sleep(self.config.poll_interval.min(deadline - elapsed));
        }
    }

    fn storage_upload(&self, api_key: &str, bytes: &[u8], mime: &str) -> Result<String> {
        let initiate_url = format!(
            "{}/storage/upload/initiate?storage_type=fal-cdn-v3",
            self.config.storage_base
        );
        let response = self
            .http
            .post(&initiate_url)
            .header(AUTHORIZATION, format!("Key {api_key}"))
            .json(&json!({
                "content_type": mime,
                "file_name": format!("upload.{}", extension_for_mime(mime)),
            }))
            .send()
            .map_err(|err| transport_error("upload", err, self.config.http_timeout))?;
        let ticket = response_json_or_error("upload", response)?;
        let field = |key: &str| {
            ticket
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    CutsheetError::network(format!("upload initiate response missing {key}"))
                })
        };
        let upload_url = field("upload_url")?;
        let file_url = field("file_url")?;

        let response = self
            .http
            .put(&upload_url)
            .header(CONTENT_TYPE, mime)
            .body(bytes.to_vec())
            .send()
            .map_err(|err| transport_error("upload", err, self.config.http_timeout))?;
        ensure_success("upload", response)?;
        Ok(file_url)
    }
}

impl RemoteImageService for FalClient {
    fn upload(&self, bytes: &[u8], mime: &str) -> Result<String> {
        let api_key = self.config.require_api_key()?;
        match self.config.upload_mode {
            UploadMode::Inline => Ok(data_url(bytes, mime)),
            UploadMode::Storage => self.storage_upload(api_key, bytes, mime),
        }
    }

    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let endpoint = self.config.generate_endpoint.clone();
        let payload = serde_json::to_value(request)?;
        let result = self.run_job(&endpoint, &payload, self.config.generate_timeout)?;
        first_image_url(&endpoint, &result)
    }

    fn upscale(&self, request: &UpscaleRequest) -> Result<String> {
        let endpoint = self.config.upscale_endpoint.clone();
        let payload = serde_json::to_value(request)?;
        let result = self.run_job(&endpoint, &payload, self.config.upscale_timeout)?;
        first_image_url(&endpoint, &result)
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(bytes) = decode_data_url(url) {
            return bytes;
        }
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|err| transport_error("fetch", err, self.config.http_timeout))?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(CutsheetError::network(format!(
                "download of {url} failed ({code}): {}",
                truncate_text(&body, ERROR_BODY_MAX_CHARS)
            )));
        }
        let bytes = response
            .bytes()
            .map_err(|err| transport_error("fetch", err, self.config.http_timeout))?;
        Ok(bytes.to_vec())
    }

    fn has_credentials(&self) -> bool {
        self.config.has_api_key()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueState {
    Pending,
    Completed,
    Failed,
}

fn queue_state(payload: &Value) -> QueueState {
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .map(|value| value.trim().to_ascii_uppercase())
        .unwrap_or_default();
    match status.as_str() {
        "COMPLETED" | "OK" | "SUCCEEDED" => {
            if payload.get("error").is_some_and(|error| !error.is_null()) {
                QueueState::Failed
            } else {
                QueueState::Completed
            }
        }
        "FAILED" | "ERROR" | "CANCELLED" | "CANCELED" => QueueState::Failed,
        _ => QueueState::Pending,
    }
}

/// Owner/app part of an endpoint id; queue request paths drop any sub-route.
fn app_id(endpoint: &str) -> String {
    endpoint
        .trim()
        .trim_matches('/')
        .split('/')
        .take(2)
        .collect::<Vec<_>>()
        .join("/")
}

fn first_image_url(endpoint: &str, payload: &Value) -> Result<String> {
    extract_image_urls(payload)
        .into_iter()
        .next()
        .ok_or_else(|| CutsheetError::network(format!("{endpoint} response returned no image URLs")))
}

/// Image URLs in provider order: `images[].url`, then `image.url`, then any
/// nested `output`.
fn extract_image_urls(payload: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_urls(payload, &mut out);
    out
}

fn collect_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(url) => {
            let trimmed = url.trim();
            let usable = trimmed.starts_with("http") || trimmed.starts_with("data:");
            if usable && !out.iter().any(|existing| existing == trimmed) {
                out.push(trimmed.to_string());
            }
        }
        Value::Array(rows) => {
            for row in rows {
                collect_urls(row, out);
            }
        }
        Value::Object(obj) => {
            for key in ["url", "images", "image", "output"] {
                if let Some(nested) = obj.get(key) {
                    collect_urls(nested, out);
                }
            }
        }
        _ => {}
    }
}

fn data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

fn decode_data_url(url: &str) -> Option<Result<Vec<u8>>> {
    let rest = url.trim().strip_prefix("data:")?;
    let (_, encoded) = rest.split_once(";base64,")?;
    Some(
        BASE64
            .decode(encoded.trim())
            .map_err(|err| CutsheetError::decode(format!("invalid base64 data URL: {err}"))),
    )
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

fn transport_error(what: &str, err: reqwest::Error, timeout: Duration) -> CutsheetError {
    if err.is_timeout() {
        return CutsheetError::Timeout {
            what: what.to_string(),
            seconds: timeout.as_secs_f64(),
        };
    }
    CutsheetError::network(format!("{what} request failed: {err}"))
}

fn status_error(what: &str, status: StatusCode, body: &str) -> CutsheetError {
    let code = status.as_u16();
    let body = truncate_text(body, ERROR_BODY_MAX_CHARS);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return CutsheetError::Auth(format!("{what} rejected the API key ({code}): {body}"));
    }
    CutsheetError::network(format!("{what} request failed ({code}): {body}"))
}

fn ensure_success(what: &str, response: HttpResponse) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().unwrap_or_default();
    Err(status_error(what, status, &body))
}

fn response_json_or_error(what: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| CutsheetError::network(format!("{what} response body read failed: {err}")))?;
    if !status.is_success() {
        return Err(status_error(what, status, &body));
    }
    serde_json::from_str(&body).map_err(|err| {
        CutsheetError::network(format!("{what} returned invalid JSON payload: {err}"))
    })
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
