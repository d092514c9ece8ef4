//! Server-Sent Events (SSE) framing over a response stream.
//!
//! The transport never re-frames bodies; callers consuming an event stream
//! (e.g. `"stream": true` chat completions) opt into line framing here.
//!
//! SSE format:
//! ```text
//! data: {"key": "value"}
//!
//! data: {"another": "event"}
//!
//! data: [DONE]
//! ```

use futures::stream::{self, Stream, StreamExt};

use crate::error::ClientError;
use crate::stream::{ByteStream, ResponseStream};

/// Extension trait turning a byte stream into SSE `data:` payloads.
///
/// # Example
/// ```ignore
/// use futures::StreamExt;
/// use oaiclient::sse::SseStreamExt;
///
/// let stream = client.stream(request).await?;
/// let events = stream.sse();
/// futures::pin_mut!(events);
/// while let Some(data) = events.next().await {
///     println!("SSE data: {}", data?);
/// }
/// ```
pub trait SseStreamExt {
    /// Yield the content after each `data: ` prefix.
    ///
    /// Stops at the `[DONE]` marker or when the body ends.
    fn sse(self) -> impl Stream<Item = Result<String, ClientError>> + Send;
}

impl SseStreamExt for ResponseStream {
    fn sse(self) -> impl Stream<Item = Result<String, ClientError>> + Send {
        self.into_body().sse()
    }
}

impl SseStreamExt for ByteStream {
    fn sse(self) -> impl Stream<Item = Result<String, ClientError>> + Send {
        stream::unfold(
            (self, Vec::<u8>::new(), false),
            |(mut byte_stream, mut buffer, mut stream_ended)| async move {
                loop {
                    // Lines are split on raw bytes so multi-byte characters
                    // spanning two chunks survive.
                    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = buffer.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line);
                        let line = line.trim();

                        if line.is_empty() {
                            continue;
                        }

                        if let Some(data) = parse_sse_line(line) {
                            if is_done_marker(data) {
                                return None;
                            }
                            let data = data.to_string();
                            return Some((Ok(data), (byte_stream, buffer, stream_ended)));
                        }
                    }

                    if stream_ended {
                        let rest = String::from_utf8_lossy(&buffer).trim().to_string();
                        buffer.clear();
                        return parse_sse_line(&rest)
                            .filter(|data| !is_done_marker(data))
                            .map(|data| (Ok(data.to_string()), (byte_stream, buffer, stream_ended)));
                    }

                    match byte_stream.next().await {
                        Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                        Some(Err(e)) => {
                            return Some((Err(e), (byte_stream, buffer, stream_ended)));
                        }
                        None => stream_ended = true,
                    }
                }
            },
        )
    }
}

/// Parse an SSE line to extract the data portion.
///
/// SSE lines are in the format: `data: <content>`
///
/// # Example
/// ```
/// use oaiclient::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "invalid";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|s| s.trim())
}

/// Check if an SSE data line indicates the stream is done.
///
/// # Example
/// ```
/// use oaiclient::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker(""));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}
