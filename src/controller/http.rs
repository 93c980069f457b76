//! HTTP management-plane client.
//!
//! # Responsibilities
//! - POST `{base_url}{resource_id}/{stop|start}?api-version=...`
//! - Attach the static bearer token when configured
//! - Enforce the per-request timeout

use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::config::ControllerConfig;
use crate::controller::{ControlOperation, ControlStatus, ControllerError, ResourceController};

#[derive(Clone)]
pub struct HttpResourceController {
    client: reqwest::Client,
    base_url: Url,
    api_version: String,
    bearer_token: Option<String>,
    timeout_duration: Duration,
}

impl HttpResourceController {
    pub fn new(config: &ControllerConfig) -> Result<Self, ControllerError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ControllerError::InvalidRequest(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_version: config.api_version.clone(),
            bearer_token: config.bearer_token.clone(),
            timeout_duration: Duration::from_secs(config.request_timeout_secs),
        })
    }

    /// Resource ids are management paths and are appended to the base URL as-is.
    pub fn operation_url(
        &self,
        operation: ControlOperation,
        resource_id: &str,
    ) -> Result<Url, ControllerError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = resource_id.trim_matches('/');
        if path.is_empty() {
            return Err(ControllerError::InvalidRequest(
                "resource id must not be empty".to_string(),
            ));
        }

        let mut url = Url::parse(&format!("{}/{}/{}", base, path, operation.as_str()))
            .map_err(|e| ControllerError::InvalidRequest(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    async fn send(
        &self,
        operation: ControlOperation,
        resource_id: &str,
    ) -> Result<ControlStatus, ControllerError> {
        let url = self.operation_url(operation, resource_id)?;
        let mut request = self.client.post(url.clone());
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = match timeout(self.timeout_duration, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ControllerError::Transport(e.to_string())),
            Err(_) => return Err(ControllerError::Timeout(self.timeout_duration)),
        };

        let code = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        tracing::debug!(
            operation = %operation,
            resource_id = %resource_id,
            url = %url,
            status = code,
            "Management call finished"
        );

        Ok(ControlStatus { code, detail })
    }
}

impl ResourceController for HttpResourceController {
    async fn stop(&self, resource_id: &str) -> Result<ControlStatus, ControllerError> {
        self.send(ControlOperation::Stop, resource_id).await
    }

    async fn start(&self, resource_id: &str) -> Result<ControlStatus, ControllerError> {
        self.send(ControlOperation::Start, resource_id).await
    }
}

impl std::fmt::Debug for HttpResourceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResourceController")
            .field("base_url", &self.base_url.as_str())
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout_duration)
            .finish()
    }
}
