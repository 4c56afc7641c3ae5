//! Fallback flag requests
//!
//! Used when the stream sends a reference (`indirect/*`) instead of an
//! inline payload.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::StatusCode;
use tracing::debug;

use crate::config::Config;
use crate::error::{FetchError, StreamResult};
use crate::http;
use crate::models::{AllFlags, FeatureFlag};

/// Point queries against the flag origin
pub trait FeatureRequester: Send + Sync {
    /// Fetch a single flag
    fn get_one<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<FeatureFlag, FetchError>>;

    /// Fetch the full dataset
    fn get_all(&self) -> BoxFuture<'_, Result<AllFlags, FetchError>>;
}

/// Requester backed by the flag origin's polling endpoints
pub struct HttpFeatureRequester {
    client: reqwest::Client,
    config: Config,
}

impl HttpFeatureRequester {
    pub fn new(config: Config) -> StreamResult<Self> {
        let client = http::build_client(&config, Some(config.request_timeout()))?;
        Ok(Self { client, config })
    }

    async fn fetch_one(&self, key: &str) -> Result<FeatureFlag, FetchError> {
        let uri = self.config.flag_uri(key);
        debug!("Requesting flag from {}", uri);

        let response = self.client.get(&uri).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(FetchError::NotFound {
                key: key.to_string(),
            }),
            status if !status.is_success() => Err(FetchError::Http {
                status: status.as_u16(),
            }),
            _ => Ok(response.json().await?),
        }
    }

    async fn fetch_all(&self) -> Result<AllFlags, FetchError> {
        let uri = self.config.all_flags_uri();
        debug!("Requesting all flags from {}", uri);

        let response = self.client.get(&uri).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

impl FeatureRequester for HttpFeatureRequester {
    fn get_one<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<FeatureFlag, FetchError>> {
        self.fetch_one(key).boxed()
    }

    fn get_all(&self) -> BoxFuture<'_, Result<AllFlags, FetchError>> {
        self.fetch_all().boxed()
    }
}
