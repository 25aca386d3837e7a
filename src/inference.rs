// src/inference.rs
use reqwest::{blocking::Client, header::CONTENT_TYPE, StatusCode};
use serde_json::Value as Json;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::payload::Payload;

/// Anything that turns a payload into an inference response.
pub trait InferenceBackend {
    fn predict(&self, payload: &Payload) -> Result<Json>;
}

/// Blocking HTTP client for the prediction endpoint. One attempt per call;
/// retrying is left to the user.
pub struct HttpInferenceClient {
    client: Client,
    endpoint: Url,
    timeout_secs: u64,
}

impl HttpInferenceClient {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let endpoint = config.endpoint_url()?;

        if config.accept_invalid_certs {
            warn!(
                endpoint = %endpoint,
                "TLS certificate validation is DISABLED; the endpoint is not authenticated"
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| PipelineError::Config(format!("building HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn classify(&self, err: reqwest::Error) -> PipelineError {
        if err.is_timeout() {
            PipelineError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            PipelineError::Transport(err.to_string())
        }
    }
}

impl InferenceBackend for HttpInferenceClient {
    #[tracing::instrument(level = "info", skip(self, payload), fields(endpoint = %self.endpoint, row = payload.row))]
    fn predict(&self, payload: &Payload) -> Result<Json> {
        debug!(payload = %payload.body, "sending request");

        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(&payload.body)
            .send()
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        let body = resp.text().map_err(|e| self.classify(e))?;

        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "inference request rejected");
            return Err(PipelineError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: Json = serde_json::from_str(&body).map_err(|e| {
            PipelineError::InvalidResponse(format!("body is not JSON: {}", e))
        })?;
        info!(bytes = body.len(), "inference response received");
        Ok(parsed)
    }
}
