// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

/// User agent sent on every request; many feed hosts reject default agents
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// A streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// HTTP response with status, content length, and body stream
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Length header value, if present
    pub content_length: Option<u64>,
    /// Response body as a stream of bytes
    pub body: ByteStream,
}

/// Fully buffered HTTP response
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: u16,
    pub body: Bytes,
}

impl BufferedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Per-request knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Whole-request timeout; `None` leaves only the client's connect timeout
    pub timeout: Option<Duration>,
    /// Skip certificate validation for this request.
    ///
    /// Many podcast hosts serve broken certificate chains. Relaxing validation
    /// trades transport integrity for interoperability, so the client only
    /// honours it when built with relaxed TLS enabled.
    pub relaxed_tls: bool,
    /// Longest silence between body chunks before a streamed download gives up
    pub read_timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(timeout: Option<Duration>, relaxed_tls: bool) -> Self {
        Self {
            timeout,
            relaxed_tls,
            read_timeout: None,
        }
    }

    pub fn strict(timeout: Duration) -> Self {
        Self::new(Some(timeout), false)
    }

    pub fn relaxed(timeout: Duration) -> Self {
        Self::new(Some(timeout), true)
    }

    /// Streaming download: no overall deadline, bounded idle time, full validation
    pub fn download(read_timeout: Duration) -> Self {
        Self {
            read_timeout: Some(read_timeout),
            ..Self::new(None, false)
        }
    }
}

/// HTTP client abstraction for testability
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch the entire response body, whatever the status code
    async fn get(&self, url: &str, options: RequestOptions)
    -> Result<BufferedResponse, reqwest::Error>;

    /// Get a streaming response for large downloads
    async fn get_stream(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, reqwest::Error>;
}

/// Default HTTP client implementation using reqwest
#[derive(Clone)]
pub struct ReqwestClient {
    strict: reqwest::Client,
    relaxed: reqwest::Client,
}

impl ReqwestClient {
    /// Build the client pair.
    ///
    /// With `allow_relaxed_tls == false` both halves validate certificates and
    /// `RequestOptions::relaxed_tls` has no effect. `read_timeout` bounds every
    /// socket read, so a host that stops sending mid-body cannot hang a request.
    pub fn new(
        user_agent: &str,
        allow_relaxed_tls: bool,
        read_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let connect_timeout = Duration::from_secs(30);

        let strict = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()?;

        let relaxed = if allow_relaxed_tls {
            reqwest::Client::builder()
                .user_agent(user_agent)
                .connect_timeout(connect_timeout)
                .read_timeout(read_timeout)
                .danger_accept_invalid_certs(true)
                .build()?
        } else {
            strict.clone()
        };

        Ok(Self { strict, relaxed })
    }

    fn request(&self, url: &str, options: RequestOptions) -> reqwest::RequestBuilder {
        let client = if options.relaxed_tls {
            &self.relaxed
        } else {
            &self.strict
        };
        let builder = client.get(url);
        match options.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<BufferedResponse, reqwest::Error> {
        let response = self.request(url, options).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(BufferedResponse { status, body })
    }

    async fn get_stream(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, reqwest::Error> {
        use futures::StreamExt;

        let response = self.request(url, options).send().await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        let body: ByteStream = Box::pin(response.bytes_stream().map(|result| result));

        Ok(HttpResponse {
            status,
            content_length,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::StreamExt;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[test]
    fn reqwest_client_can_be_created_in_both_modes() {
        let read_timeout = Duration::from_secs(60);
        assert!(ReqwestClient::new(BROWSER_USER_AGENT, true, read_timeout).is_ok());
        assert!(ReqwestClient::new(BROWSER_USER_AGENT, false, read_timeout).is_ok());
    }

    #[test]
    fn download_options_bound_idle_time_only() {
        let options = RequestOptions::download(Duration::from_secs(45));
        assert_eq!(options.timeout, None);
        assert_eq!(options.read_timeout, Some(Duration::from_secs(45)));
        assert!(!options.relaxed_tls);
    }

    #[test]
    fn plain_options_have_no_read_timeout() {
        assert_eq!(RequestOptions::strict(Duration::from_secs(1)).read_timeout, None);
    }

    #[tokio::test]
    async fn stalled_body_errors_instead_of_hanging() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\nabc")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client =
            ReqwestClient::new(BROWSER_USER_AGENT, false, Duration::from_millis(200)).unwrap();

        let drained = tokio::time::timeout(Duration::from_secs(10), async {
            let response = client
                .get_stream(&format!("http://{addr}/a.mp3"), RequestOptions::download(Duration::from_secs(60)))
                .await
                .unwrap();
            let mut body = response.body;
            let mut failed = false;
            while let Some(chunk) = body.next().await {
                if chunk.is_err() {
                    failed = true;
                    break;
                }
            }
            failed
        })
        .await;

        server.abort();
        assert_eq!(drained, Ok(true), "stalled body should end in a read error");
    }

    #[test]
    fn buffered_response_success_range() {
        let ok = BufferedResponse {
            status: 204,
            body: Bytes::new(),
        };
        let missing = BufferedResponse {
            status: 404,
            body: Bytes::new(),
        };
        assert!(ok.is_success());
        assert!(!missing.is_success());
    }
}
