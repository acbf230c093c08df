//! REST+JSON endpoint (gas-tracker and price APIs).

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;
use vigil_types::{ConfigError, ResilienceError};

use super::classify;

#[derive(Debug)]
pub struct HttpApiEndpoint {
    id: String,
    base_url: Url,
    status_path: String,
    api_key: Option<String>,
    client: Client,
    request_timeout: Duration,
}

impl HttpApiEndpoint {
    pub fn new(
        id: impl Into<String>,
        base_url: &str,
        status_path: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ResilienceError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| ConfigError::invalid_value("api_url", base_url, e))?;
        // Relative joins replace the last segment unless the base ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConfigError::invalid_value("api_url", base_url.as_str(), e))?;
        Ok(Self {
            id: id.into(),
            base_url,
            status_path: status_path.into(),
            api_key: None,
            client,
            request_timeout,
        })
    }

    /// Attach an API key, sent as the `apikey` query parameter.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ResilienceError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ResilienceError::upstream(&self.id, format!("Invalid path {path}: {e}")))
    }

    /// GET `path` relative to the base URL and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ResilienceError> {
        let mut request = self.client.get(self.endpoint(path)?).query(query);
        if let Some(key) = &self.api_key {
            request = request.query(&[("apikey", key.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify::from_reqwest(&self.id, &e, self.request_timeout))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(classify::from_status(&self.id, status, &headers, &text));
        }

        response.json::<T>().await.map_err(|e| classify::from_reqwest(&self.id, &e, self.request_timeout))
    }

    /// Liveness probe: any 2xx from the status path.
    pub(crate) async fn probe(&self) -> Result<(), ResilienceError> {
        let response = self
            .client
            .get(self.endpoint(&self.status_path)?)
            .send()
            .await
            .map_err(|e| classify::from_reqwest(&self.id, &e, self.request_timeout))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(classify::from_status(&self.id, status, response.headers(), ""))
        }
    }
}
