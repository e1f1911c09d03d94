//! Typed client for server -> host calls: the request proxy. Every host
//! invocation is a plain HTTP POST with a JSON body and a JSON response,
//! following the same `Client::post(..).json(..).send().await` shape used
//! for outbound provider calls elsewhere in the workspace, generalized
//! from a single fixed endpoint to an arbitrary host URL + path.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("host unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("host returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Thin wrapper binding a `reqwest::Client` to one host's base URL. A new
/// `HostClient` is built per call rather than cached, since the server
/// talks to whichever host a request names, not a fixed one.
pub struct HostClient {
    client: reqwest::Client,
    base_url: String,
}

impl HostClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Binds a caller-owned client instead of creating a fresh one, so a
    /// server that already pools connections for its own outbound calls
    /// reuses that pool for host calls too.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ProxyError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProxyError::Status { status, body: text });
        }
        Ok(response.json::<R>().await?)
    }

    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, ProxyError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProxyError::Status { status, body: text });
        }
        Ok(response.json::<R>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = HostClient::new("http://host:6109/");
        assert_eq!(client.base_url, "http://host:6109/");
        // normalization happens per-call in post_json/get_json, not at
        // construction; this just documents the stored form.
    }
}
