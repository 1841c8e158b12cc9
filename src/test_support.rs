use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use crate::http::{BufferedResponse, ByteStream, HttpClient, HttpResponse, RequestOptions};
use crate::progress::{ProgressEvent, ProgressReporter};

#[derive(Clone)]
enum MockResponse {
    Body { status: u16, body: Vec<u8> },
    TransportError,
    /// Streams `first_chunk`, then fails mid-body
    BrokenStream { first_chunk: Vec<u8> },
    /// Streams `first_chunk`, then never sends anything again
    StalledStream { first_chunk: Vec<u8> },
}

/// HTTP client answering from a URL table; unknown URLs get a 404
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    requests: Arc<Mutex<Vec<(String, RequestOptions)>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.with_status(url, 200, body)
    }

    pub fn with_status(self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.insert(
            url,
            MockResponse::Body {
                status,
                body: body.into(),
            },
        )
    }

    pub fn failing(self, url: &str) -> Self {
        self.insert(url, MockResponse::TransportError)
    }

    pub fn with_broken_stream(self, url: &str, first_chunk: impl Into<Vec<u8>>) -> Self {
        self.insert(
            url,
            MockResponse::BrokenStream {
                first_chunk: first_chunk.into(),
            },
        )
    }

    pub fn with_stalled_stream(self, url: &str, first_chunk: impl Into<Vec<u8>>) -> Self {
        self.insert(
            url,
            MockResponse::StalledStream {
                first_chunk: first_chunk.into(),
            },
        )
    }

    fn insert(self, url: &str, response: MockResponse) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
        self
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn options_for(&self, url: &str) -> Option<RequestOptions> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, options)| *options)
    }

    fn lookup(&self, url: &str, options: RequestOptions) -> MockResponse {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), options));

        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(MockResponse::Body {
                status: 404,
                body: b"Not Found".to_vec(),
            })
    }
}

/// A real `reqwest::Error`, produced without touching the network
pub fn transport_error() -> reqwest::Error {
    reqwest::Client::new()
        .get("http://[::1")
        .build()
        .unwrap_err()
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<BufferedResponse, reqwest::Error> {
        match self.lookup(url, options) {
            MockResponse::Body { status, body } => Ok(BufferedResponse {
                status,
                body: Bytes::from(body),
            }),
            _ => Err(transport_error()),
        }
    }

    async fn get_stream(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, reqwest::Error> {
        let (status, content_length, body) = match self.lookup(url, options) {
            MockResponse::Body { status, body } => {
                let len = body.len() as u64;
                let stream: ByteStream =
                    Box::pin(futures::stream::once(async move { Ok(Bytes::from(body)) }));
                (status, len, stream)
            }
            MockResponse::TransportError => return Err(transport_error()),
            MockResponse::BrokenStream { first_chunk } => {
                let len = first_chunk.len() as u64 * 2;
                let stream: ByteStream = Box::pin(futures::stream::iter([
                    Ok(Bytes::from(first_chunk)),
                    Err(transport_error()),
                ]));
                (200, len, stream)
            }
            MockResponse::StalledStream { first_chunk } => {
                let len = first_chunk.len() as u64 * 2;
                let stream: ByteStream = Box::pin(
                    futures::stream::once(async move { Ok(Bytes::from(first_chunk)) })
                        .chain(futures::stream::pending()),
                );
                (200, len, stream)
            }
        };

        Ok(HttpResponse {
            status,
            content_length: Some(content_length),
            body,
        })
    }
}

/// Reporter that keeps every event for later assertions
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
