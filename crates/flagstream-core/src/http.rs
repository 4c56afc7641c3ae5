//! Shared HTTP client setup

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};

use crate::config::Config;
use crate::error::StreamResult;

/// User agent sent with every request
pub const USER_AGENT_VALUE: &str = concat!("flagstream/", env!("CARGO_PKG_VERSION"));

/// Headers common to stream and fallback requests
pub fn base_headers(config: &Config) -> StreamResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    if let Some(ref key) = config.sdk_key {
        let mut value = HeaderValue::from_str(key)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

/// Build a client honoring the TLS and timeout settings
///
/// `request_timeout` bounds whole requests and must be `None` for the
/// long-lived stream, which relies on its own idle timeout instead.
pub fn build_client(
    config: &Config,
    request_timeout: Option<Duration>,
) -> StreamResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .default_headers(base_headers(config)?)
        .connect_timeout(config.connect_timeout())
        .danger_accept_invalid_certs(!config.verify_ssl);

    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }

    Ok(builder.build()?)
}
