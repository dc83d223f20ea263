//! The `http` module provides `HttpTransport`, which lets an `Updater` download metadata and
//! targets over HTTP.
use crate::transport::{Transport, TransportError, TransportErrorKind, TransportStream};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use log::{debug, trace};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// A builder for [`HttpTransport`].
///
/// # Example
///
/// ```
/// # use std::time::Duration;
/// # use tuf_updater::HttpTransportBuilder;
/// let http_transport = HttpTransportBuilder::new()
///     .timeout(Duration::from_secs(100))
///     .tries(3)
///     .build();
/// ```
#[derive(Clone, Copy, Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    connect_timeout: Duration,
    tries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            // try / 100ms / try / 200ms / try
            tries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl HttpTransportBuilder {
    /// Create a new `HttpTransportBuilder` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a timeout for each request, from connecting until the body is fully read.
    #[must_use]
    pub fn timeout(mut self, value: Duration) -> Self {
        self.timeout = value;
        self
    }

    /// Set a timeout for only the connect phase.
    #[must_use]
    pub fn connect_timeout(mut self, value: Duration) -> Self {
        self.connect_timeout = value;
        self
    }

    /// Set the number of requests sent for one fetch. Values below 1 are treated as 1.
    #[must_use]
    pub fn tries(mut self, value: u32) -> Self {
        self.tries = value;
        self
    }

    /// Set the pause before the second request. Each later pause doubles, up to `max_backoff`.
    #[must_use]
    pub fn initial_backoff(mut self, value: Duration) -> Self {
        self.initial_backoff = value;
        self
    }

    /// Set the longest pause between two requests.
    #[must_use]
    pub fn max_backoff(mut self, value: Duration) -> Self {
        self.max_backoff = value;
        self
    }

    /// Construct an [`HttpTransport`] from this builder's settings.
    pub fn build(self) -> HttpTransport {
        HttpTransport { settings: self }
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_backoff)
    }
}

/// A [`Transport`] over HTTP. Use the [`HttpTransportBuilder`] to construct a custom
/// `HttpTransport`, or use `HttpTransport::default()`.
///
/// A request is sent again when it times out, cannot connect, or gets a 5xx response. Once a
/// successful response arrives its body is streamed as is; an error while reading the body ends
/// the stream.
///
/// These response codes are reported as `FileNotFound`:
/// - 403: Forbidden. (Some services return this code when a file does not exist.)
/// - 404: Not Found.
/// - 410: Gone.
///
/// Every unsuccessful response carries its status code in the returned [`TransportError`].
///
/// # Proxy Support
///
/// To use the `HttpTransport` with a proxy, specify the `HTTPS_PROXY` environment variable.
/// The transport will also respect the `NO_PROXY` environment variable.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpTransport {
    settings: HttpTransportBuilder,
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: Url) -> Result<TransportStream, TransportError> {
        let client = ClientBuilder::new()
            .timeout(self.settings.timeout)
            .connect_timeout(self.settings.connect_timeout)
            .build()
            .map_err(|e| TransportError::new_with_cause(TransportErrorKind::Other, &url, e))?;

        let tries = self.settings.tries.max(1);
        let mut backoff = self.settings.initial_backoff;
        let mut attempt = 1;
        let response = loop {
            match send(&client, &url).await {
                Ok(response) => break response,
                Err(Failure::Retryable(e)) if attempt < tries => {
                    debug!(
                        "try {} of {} for '{}' failed, retrying in {:?}: {}",
                        attempt, tries, url, backoff, e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = self.settings.next_backoff(backoff);
                    attempt += 1;
                }
                Err(Failure::Retryable(e) | Failure::Fatal(e)) => return Err(e),
            }
        };

        trace!("streaming response body of '{}'", url);
        Ok(response
            .bytes_stream()
            .map_err(move |e| TransportError::new_with_cause(TransportErrorKind::Other, &url, e))
            .boxed())
    }
}

/// A failed request, and whether sending it again may help.
enum Failure {
    Retryable(TransportError),
    Fatal(TransportError),
}

/// Sends one `GET` request and turns an unsuccessful response into an error.
async fn send(client: &Client, url: &Url) -> Result<Response, Failure> {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            let retryable = e.is_timeout() || e.is_connect() || e.is_request();
            trace!("request for '{}' failed: {}", url, e);
            let error = TransportError::new_with_cause(TransportErrorKind::Other, url, e);
            return Err(if retryable {
                Failure::Retryable(error)
            } else {
                Failure::Fatal(error)
            });
        }
    };

    let status = response.status();
    if let Err(e) = response.error_for_status_ref() {
        trace!("'{}' responded with {}", url, status);
        let error = TransportError::new_with_cause(status_kind(status), url, e)
            .with_status(status.as_u16());
        return Err(if status.is_server_error() {
            Failure::Retryable(error)
        } else {
            Failure::Fatal(error)
        });
    }
    Ok(response)
}

fn status_kind(status: StatusCode) -> TransportErrorKind {
    match status {
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::GONE => {
            TransportErrorKind::FileNotFound
        }
        _ => TransportErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_statuses() {
        for code in [403, 404, 410] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(status_kind(status), TransportErrorKind::FileNotFound);
        }
        for code in [400, 401, 500, 503] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(status_kind(status), TransportErrorKind::Other);
        }
    }

    #[test]
    fn backoff_doubles_up_to_max() {
        let settings = HttpTransportBuilder::new()
            .initial_backoff(Duration::from_millis(300))
            .max_backoff(Duration::from_secs(1));
        let second = settings.next_backoff(Duration::from_millis(300));
        assert_eq!(second, Duration::from_millis(600));
        assert_eq!(settings.next_backoff(second), Duration::from_secs(1));
    }
}
