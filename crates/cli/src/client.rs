//! API client for the prediction server

use anyhow::{bail, Context, Result};
use model_lib::{Decision, OutputRecord, RawRecord};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the prediction server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;
        Self::decode(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response.json().await.context("Failed to parse response");
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ApiError>(&body) {
            Ok(ApiError {
                error,
                field: Some(field),
                message,
            }) => bail!(
                "API error ({}): {} on '{}': {}",
                status,
                error,
                field,
                message.unwrap_or_default()
            ),
            Ok(ApiError {
                error,
                message: Some(message),
                ..
            }) => bail!("API error ({}): {}: {}", status, error, message),
            Ok(ApiError { error, .. }) => bail!("API error ({}): {}", status, error),
            Err(_) => bail!("API error ({}): {}", status, body),
        }
    }
}

/// Error body returned by the server
#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// API request and response types

#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest<'a> {
    pub features: &'a RawRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteModelInfo {
    pub model_type: String,
    pub schema_fingerprint: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub task: String,
    pub outputs: OutputRecord,
    pub decision: Decision,
    #[serde(default)]
    pub model: Option<RemoteModelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub task: String,
    pub loaded: bool,
    pub can_rollback: bool,
    #[serde(default)]
    pub artifact: Option<String>,
    #[serde(default)]
    pub model: Option<RemoteModelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub models: Vec<ModelSummary>,
}
