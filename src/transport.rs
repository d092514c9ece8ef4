//! Transport-agnostic request descriptor and the pluggable transport seam.
//!
//! A [`Session`](crate::session::Session) resolves its option descriptors into
//! a [`PreparedRequest`] and hands it to a [`Transport`]. The transport only
//! moves bytes: it returns the status line, headers and a lazy body stream,
//! and the session decides whether that body is buffered, handed to a
//! callback, written to a file or given to the caller.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use std::fmt;

use crate::error::Result;
use crate::options::{Header, ProxyCredentials, Timeout};
use crate::stream::ByteStream;

/// HTTP verb of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of one resolved multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormData {
    Text(String),
    Bytes {
        data: Bytes,
        filename: Option<String>,
    },
}

/// A multipart field with its file contents already loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub data: FormData,
    pub content_type: Option<String>,
}

/// Body of a prepared request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Bytes(Bytes),
    Form(Vec<FormPart>),
}

/// Proxy selected for the request's URL scheme.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub url: String,
    pub credentials: Option<ProxyCredentials>,
}

/// Everything a transport needs to perform one request.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Header,
    pub body: RequestBody,
    pub timeout: Option<Timeout>,
    pub proxy: Option<ProxyConfig>,
}

/// What a transport got back, with the body still unread.
pub struct TransportResponse {
    /// `0` when no response was received at all.
    pub status_code: u16,
    pub status_line: String,
    pub reason: String,
    /// Effective URL after redirects.
    pub url: String,
    pub headers: Header,
    pub body: ByteStream,
}

impl TransportResponse {
    /// A response standing in for a request that never got an answer.
    pub fn no_response(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status_code: 0,
            status_line: String::new(),
            reason: reason.into(),
            url: url.into(),
            headers: Header::new(),
            body: Box::pin(stream::empty()),
        }
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status_code", &self.status_code)
            .field("status_line", &self.status_line)
            .field("reason", &self.reason)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Executes prepared requests.
///
/// Implement this trait to plug in a different HTTP stack, or a scripted
/// transport for tests. Transports report "no response" (connection refused,
/// timeout before headers) as a [`TransportResponse`] with status `0` so the
/// classifier can turn it into a connection error; configuration faults are
/// returned as [`ClientError::Transport`](crate::error::ClientError::Transport).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: PreparedRequest) -> Result<TransportResponse>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted transport that records every request it sees.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug)]
    pub(crate) struct MockTransport {
        status_code: u16,
        reason: String,
        headers: Header,
        chunks: Vec<Bytes>,
        delay: std::time::Duration,
        calls: AtomicUsize,
        requests: Mutex<Vec<PreparedRequest>>,
    }

    impl MockTransport {
        pub(crate) fn new(status_code: u16, body: impl Into<Bytes>) -> Self {
            Self::chunked(status_code, vec![body.into()])
        }

        pub(crate) fn chunked(status_code: u16, chunks: Vec<Bytes>) -> Self {
            Self {
                status_code,
                reason: reqwest::StatusCode::from_u16(status_code)
                    .ok()
                    .and_then(|status| status.canonical_reason())
                    .unwrap_or_default()
                    .to_string(),
                headers: Header::new().with("Content-Type", "application/json"),
                chunks,
                delay: std::time::Duration::ZERO,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn with_reason(mut self, reason: &str) -> Self {
            self.reason = reason.to_string();
            self
        }

        /// Wait this long before answering.
        pub(crate) fn with_delay(mut self, delay: std::time::Duration) -> Self {
            self.delay = delay;
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn last_request(&self) -> Option<PreparedRequest> {
            self.requests.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: PreparedRequest) -> Result<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let url = request.url.clone();
            self.requests.lock().unwrap().push(request);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            if self.status_code == 0 {
                return Ok(TransportResponse::no_response(url, self.reason.clone()));
            }

            let chunks: Vec<Result<Bytes>> = self.chunks.iter().cloned().map(Ok).collect();
            Ok(TransportResponse {
                status_code: self.status_code,
                status_line: format!("HTTP/1.1 {} {}", self.status_code, self.reason),
                reason: self.reason.clone(),
                url,
                headers: self.headers.clone(),
                body: Box::pin(stream::iter(chunks)),
            })
        }
    }
}
