use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::HttpConfig;
use super::ApiError;
use super::Entity;
use super::Service;
use super::StateClient;

/// Prefix `http://` when the URL carries no scheme.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

#[derive(Debug, Clone)]
struct Endpoint {
    /// Always ends with `/`
    base: String,
    token: String,
}

/// [`StateClient`] backed by `reqwest`.
#[derive(Debug)]
pub struct HaClient {
    http: reqwest::Client,
    endpoint: RwLock<Option<Endpoint>>,
}

impl HaClient {
    pub fn new(config: &HttpConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .build()
            .map_err(|e| ApiError::Connection(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: RwLock::new(None),
        })
    }

    fn endpoint(&self) -> Result<Endpoint, ApiError> {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ApiError::NotConfigured)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                code: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let endpoint = self.endpoint()?;
        let url = format!("{}{}", endpoint.base, path);
        debug!("GET {}", url);

        let response = self
            .send(self.http.get(&url).bearer_auth(&endpoint.token))
            .await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl StateClient for HaClient {
    fn configure(&self, base_url: &str, token: &str) {
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        *self.endpoint.write().unwrap_or_else(PoisonError::into_inner) = Some(Endpoint {
            base,
            token: token.to_string(),
        });
    }

    fn is_configured(&self) -> bool {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    async fn probe(&self) -> Result<(), ApiError> {
        let endpoint = self.endpoint()?;
        let url = format!("{}api/", endpoint.base);
        debug!("GET {}", url);
        self.send(self.http.get(&url).bearer_auth(&endpoint.token))
            .await?;
        Ok(())
    }

    async fn states(&self) -> Result<Vec<Entity>, ApiError> {
        self.get_json("api/states").await
    }

    async fn entity_state(&self, entity_id: &str) -> Result<Entity, ApiError> {
        self.get_json(&format!("api/states/{}", entity_id)).await
    }

    async fn call_service(&self, service: Service, entity_id: &str) -> Result<(), ApiError> {
        let endpoint = self.endpoint()?;
        let url = format!("{}api/services/homeassistant/{}", endpoint.base, service);
        debug!("POST {} for {}", url, entity_id);

        let body = serde_json::json!({ "entity_id": entity_id });
        self.send(
            self.http
                .post(&url)
                .bearer_auth(&endpoint.token)
                .json(&body),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("homeassistant.local:8123"), "http://homeassistant.local:8123");
        assert_eq!(normalize_url(" https://ha.example.com "), "https://ha.example.com");
        assert_eq!(normalize_url("http://10.0.0.2:8123/"), "http://10.0.0.2:8123/");
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let client = HaClient::new(&HttpConfig::default()).unwrap();
        assert!(!client.is_configured());
        assert_eq!(client.probe().await, Err(ApiError::NotConfigured));
        assert_eq!(
            client.entity_state("light.kitchen").await,
            Err(ApiError::NotConfigured)
        );
    }

    #[test]
    fn test_configure_appends_slash() {
        let client = HaClient::new(&HttpConfig::default()).unwrap();
        client.configure("http://ha.local:8123", "secret");
        assert!(client.is_configured());
        assert_eq!(client.endpoint().unwrap().base, "http://ha.local:8123/");

        client.configure("http://ha.local:8123/", "secret");
        assert_eq!(client.endpoint().unwrap().base, "http://ha.local:8123/");
    }
}
