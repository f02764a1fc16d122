//! Provider file-handle lookups.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, check_response};

/// Exchanges a provider-internal file id for a fetchable URL.
#[async_trait]
pub trait FileLookup: Send + Sync {
    /// Provider whose handles this lookup understands.
    fn provider(&self) -> &str;

    async fn lookup(&self, file_id: &str) -> ProviderResult<String>;
}

#[derive(Debug, Deserialize)]
struct FileRecord {
    #[serde(default, alias = "download_url", alias = "signed_url", alias = "file_url")]
    url: Option<String>,
}

/// `GET {endpoint}/{file_id}` returning `{"url": ...}`.
pub struct HttpFileLookup {
    http: Client,
    provider: String,
    endpoint: String,
    authorization: String,
}

impl HttpFileLookup {
    /// `authorization` is sent verbatim as the `Authorization` header.
    pub fn new(
        provider: impl Into<String>,
        endpoint: impl Into<String>,
        authorization: impl Into<String>,
    ) -> ProviderResult<Self> {
        Ok(Self {
            http: build_client(Duration::from_secs(30))?,
            provider: provider.into(),
            endpoint: endpoint.into(),
            authorization: authorization.into(),
        })
    }
}

#[async_trait]
impl FileLookup for HttpFileLookup {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn lookup(&self, file_id: &str) -> ProviderResult<String> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), file_id);
        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, &self.authorization)
            .send()
            .await?;
        let response = check_response(&self.provider, response).await?;
        let record: FileRecord = response.json().await?;

        record
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::invalid_response(
                    &self.provider,
                    format!("file {} has no URL", file_id),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_lookup_accepts_url_aliases() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/file_1"))
            .and(header("authorization", "Key k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"signed_url": "https://storage.example.com/file_1?sig=abc"}),
            ))
            .mount(&server)
            .await;

        let lookup =
            HttpFileLookup::new("fal", format!("{}/files", server.uri()), "Key k").unwrap();
        assert_eq!(
            lookup.lookup("file_1").await.unwrap(),
            "https://storage.example.com/file_1?sig=abc"
        );
    }

    #[tokio::test]
    async fn test_lookup_without_url_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "file_2"})))
            .mount(&server)
            .await;

        let lookup = HttpFileLookup::new("fal", server.uri(), "Key k").unwrap();
        assert!(matches!(
            lookup.lookup("file_2").await,
            Err(ProviderError::InvalidResponse { .. })
        ));
    }
}
