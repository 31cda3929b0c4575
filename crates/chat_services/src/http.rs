use chat_core::Config;
use reqwest::{Client, Proxy, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use crate::error::{Result, ServiceError};

/// Build the shared HTTP client: configured proxies plus transient-error retries.
pub fn build_client(config: &Config) -> Result<ClientWithMiddleware> {
    let mut builder = Client::builder();
    if !config.http_proxy.is_empty() {
        builder = builder.proxy(Proxy::http(&config.http_proxy)?);
    }
    if !config.https_proxy.is_empty() {
        builder = builder.proxy(Proxy::https(&config.https_proxy)?);
    }
    let client = builder.build()?;
    Ok(with_retry(client))
}

pub(crate) fn with_retry(client: Client) -> ClientWithMiddleware {
    // Exponential backoff: 1s, 2s, 4s with jitter
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

    ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}

/// Turn a non-success response into `ServiceError::Api` with its body.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(ServiceError::Api(format!("HTTP {}: {}", status, text)))
}
