//! OTG API client: apply config, set transmit state, fetch metrics.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::model::{
    Config, ErrorBody, MetricsRequest, MetricsSnapshot, ResponseWarning, TransmitState,
};

#[derive(Debug, Error)]
pub enum OtgError {
    #[error("failed to build HTTP client")]
    Build(#[source] reqwest::Error),

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("OTG API {url} returned {status}: {}", .errors.join("; "))]
    Server {
        url: String,
        status: u16,
        errors: Vec<String>,
    },

    #[error("could not decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Control and metrics operations of an OTG server.
#[async_trait::async_trait]
pub trait OtgApi: Send + Sync {
    async fn set_config(&self, config: &Config) -> Result<ResponseWarning, OtgError>;

    async fn set_transmit_state(&self, state: &TransmitState)
        -> Result<ResponseWarning, OtgError>;

    async fn get_metrics(&self, request: &MetricsRequest) -> Result<MetricsSnapshot, OtgError>;
}

/// OTG API over HTTP(S) with JSON bodies.
pub struct HttpApi {
    client: reqwest::Client,
    location: String,
}

impl HttpApi {
    /// `verify` set to false skips X.509 certificate validation.
    pub fn new(location: &str, verify: bool) -> Result<Self, OtgError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify)
            .build()
            .map_err(OtgError::Build)?;
        Ok(Self {
            client,
            location: location.trim_end_matches('/').to_string(),
        })
    }

    /// POST `body` to `path`, returning the endpoint URL and the JSON reply.
    /// An empty reply body reads as an empty object.
    async fn post<B>(&self, path: &str, body: &B) -> Result<(String, Value), OtgError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = format!("{}/{}", self.location, path);
        debug!(%url, "POST");

        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| OtgError::Transport {
                url: url.clone(),
                source,
            })?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|source| OtgError::Transport {
            url: url.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(OtgError::Server {
                url,
                status: status.as_u16(),
                errors: error_messages(&bytes, status),
            });
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok((url, Value::Object(Default::default())));
        }
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok((url, value)),
            Err(source) => Err(OtgError::Decode { url, source }),
        }
    }

    async fn post_for<B, R>(&self, path: &str, body: &B) -> Result<R, OtgError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let (url, value) = self.post(path, body).await?;
        serde_json::from_value(value).map_err(|source| OtgError::Decode { url, source })
    }
}

fn error_messages(body: &[u8], status: reqwest::StatusCode) -> Vec<String> {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        if !parsed.errors.is_empty() {
            return parsed.errors;
        }
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        vec![status.canonical_reason().unwrap_or("no details").to_string()]
    } else {
        vec![text]
    }
}

#[async_trait::async_trait]
impl OtgApi for HttpApi {
    async fn set_config(&self, config: &Config) -> Result<ResponseWarning, OtgError> {
        self.post_for("config", config).await
    }

    async fn set_transmit_state(
        &self,
        state: &TransmitState,
    ) -> Result<ResponseWarning, OtgError> {
        self.post_for("control/transmit", state).await
    }

    async fn get_metrics(&self, request: &MetricsRequest) -> Result<MetricsSnapshot, OtgError> {
        let (url, raw) = self.post("results/metrics", request).await?;
        MetricsSnapshot::from_raw(raw).map_err(|source| OtgError::Decode { url, source })
    }
}
