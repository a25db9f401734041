use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, header};
use tokio::time::Instant;

use crate::config::{AuthScheme, TargetConfig};
use crate::error::{AppError, AppResult, HttpError, TransportError};

use super::{ApiRequest, ApiResponse, RequestExecutor};

const SCIM_MEDIA_TYPE: &str = "application/scim+json";
const DEFAULT_POOL_SIZE: usize = 16;

/// Production [`RequestExecutor`] backed by a shared `reqwest` client.
pub struct ScimClient {
    client: Client,
    base_url: String,
    auth: AuthScheme,
}

impl ScimClient {
    /// Builds a client for the target with the default connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(target: &TargetConfig) -> AppResult<Self> {
        Self::with_pool_size(target, DEFAULT_POOL_SIZE)
    }

    /// Builds a client sized for `pool_size` concurrent connections,
    /// one per load worker.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn with_pool_size(target: &TargetConfig, pool_size: usize) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(target.timeout)
            .pool_max_idle_per_host(pool_size.max(1))
            .danger_accept_invalid_certs(target.insecure)
            .build()
            .map_err(|err| AppError::http(HttpError::BuildClientFailed { source: err }))?;

        Ok(Self {
            client,
            base_url: target.base_url.trim_end_matches('/').to_owned(),
            auth: target.auth.clone(),
        })
    }

    fn build_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.base_url, path)
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            AuthScheme::None => builder,
            AuthScheme::Bearer { token } => {
                builder.header(header::AUTHORIZATION, format!("Bearer {}", token))
            }
            AuthScheme::Basic { username, password } => {
                let encoded = BASE64.encode(format!("{}:{}", username, password));
                builder.header(header::AUTHORIZATION, format!("Basic {}", encoded))
            }
            AuthScheme::ApiKey { header, value } => builder.header(header.as_str(), value.as_str()),
        }
    }
}

#[async_trait]
impl RequestExecutor for ScimClient {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.build_url(&request.path);
        let start = Instant::now();

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(header::CONTENT_TYPE, SCIM_MEDIA_TYPE)
            .header(header::ACCEPT, SCIM_MEDIA_TYPE);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = self.apply_auth(builder);
        if let Some(body) = request.body.as_ref() {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(TransportError::from)?;
        let status = response.status();

        let mut headers = std::collections::HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.to_string(), value.to_owned());
            }
        }

        let body = response.text().await.map_err(TransportError::from)?;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(ApiResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_owned(),
            headers,
            body,
            duration_ms,
        })
    }
}
