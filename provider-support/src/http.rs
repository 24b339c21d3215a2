use std::time::Duration;

use anyhow::Result;
use duration_str::deserialize_option_duration;
use reqwest::{Client, Response, StatusCode, Url, header::HeaderMap};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpClientConfig {
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub connection_timeout: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub request_timeout: Option<Duration>,
}

/// A JSON-over-HTTP client. Cheap to clone; clones share one connection pool.
#[derive(Clone, Debug)]
pub struct HttpClient(Client);

impl HttpClient {
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        Self::with_headers(config, HeaderMap::new())
    }

    /// Builds a client which sends `headers` (e.g. API keys) on every request.
    pub fn with_headers(config: &HttpClientConfig, headers: HeaderMap) -> Result<Self> {
        let connection_timeout = config.connection_timeout.unwrap_or(Duration::from_secs(30));
        let request_timeout = config.request_timeout.unwrap_or(Duration::from_secs(30));
        let client = Client::builder()
            .connect_timeout(connection_timeout)
            .timeout(request_timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self(client))
    }

    pub async fn get<Res>(&self, url: Url) -> ProviderResult<Res>
    where
        Res: for<'a> Deserialize<'a>,
    {
        debug!(%url, "GET");
        let res = self
            .0
            .get(url)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        read_json(res, false).await
    }

    /// POSTs a JSON body. Tries to decode the response even when the status
    /// is not a success, since protocols such as JSON-RPC report their own
    /// errors inside the body.
    pub async fn exchange<Req, Res>(&self, url: Url, req: &Req) -> ProviderResult<Res>
    where
        Req: Serialize,
        Res: for<'a> Deserialize<'a>,
    {
        debug!(%url, "POST");
        let res = self
            .0
            .post(url)
            .json(req)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        read_json(res, true).await
    }
}

async fn read_json<Res>(res: Response, lenient: bool) -> ProviderResult<Res>
where
    Res: for<'a> Deserialize<'a>,
{
    let status = res.status();
    let body = res.bytes().await.map_err(ProviderError::from_reqwest)?;
    if status.is_success() {
        return Ok(serde_json::from_slice(&body)?);
    }
    if lenient {
        if let Ok(value) = serde_json::from_slice(&body) {
            return Ok(value);
        }
    }
    Err(status_error(status, &String::from_utf8_lossy(&body)))
}

fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.trim())
    };
    let err = match status {
        StatusCode::NOT_FOUND => ProviderError::not_found(message),
        s if s.is_client_error() => ProviderError::bad_request(message),
        _ => ProviderError::backend_unavailable(message),
    };
    err.with_field("status", status.as_u16())
}
