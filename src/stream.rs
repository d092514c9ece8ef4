//! Consumer-driven body streams.

use bytes::Bytes;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::ClientError;
use crate::options::Header;

/// Lazy, finite, non-restartable sequence of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// A successful response whose body is read on demand.
///
/// Chunks arrive in receive order with no re-framing. Dropping the stream
/// before it is exhausted aborts the underlying transfer.
pub struct ResponseStream {
    status_code: u16,
    status_line: String,
    reason: String,
    url: String,
    headers: Header,
    body: ByteStream,
}

impl ResponseStream {
    pub(crate) fn new(
        status_code: u16,
        status_line: String,
        reason: String,
        url: String,
        headers: Header,
        body: ByteStream,
    ) -> Self {
        Self {
            status_code,
            status_line,
            reason,
            url,
            headers,
            body,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &Header {
        &self.headers
    }

    pub fn into_body(self) -> ByteStream {
        self.body
    }
}

impl Stream for ResponseStream {
    type Item = Result<Bytes, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.body.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStream")
            .field("status_code", &self.status_code)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}
