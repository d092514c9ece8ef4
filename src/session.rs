//! Single-use transport session.
//!
//! A [`Session`] accumulates option descriptors, resolves them into one
//! [`PreparedRequest`], executes exactly one verb against its transport and
//! yields a [`RawResult`]. Applying options after that is an error.
//!
//! ```text
//! Idle --apply--> Configured --verb--> Executing --> Completed
//!                                                \-> Failed
//! ```

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use crate::error::{ClientError, Result};
use crate::options::{
    validate_file, Body, Header, Multipart, PartData, Parameters, ProxyAuth, Proxies,
    RequestOption, Timeout, Url, WriteCallback,
};
use crate::response::RawResult;
use crate::stream::{ByteStream, ResponseStream};
use crate::transport::{
    FormData, FormPart, Method, PreparedRequest, ProxyConfig, RequestBody, Transport,
    TransportResponse,
};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Configured,
    Executing,
    Completed,
    Failed,
}

/// Where a response body goes.
enum Sink<'a> {
    Buffer,
    Callback(WriteCallback),
    File(&'a Path),
}

/// One configured, single-use execution unit.
pub struct Session {
    transport: Arc<dyn Transport>,
    state: SessionState,
    url: Option<Url>,
    headers: Header,
    body: Option<Body>,
    multipart: Option<Multipart>,
    parameters: Option<Parameters>,
    timeout: Option<Timeout>,
    proxies: Proxies,
    proxy_auth: ProxyAuth,
    write_callback: Option<WriteCallback>,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: SessionState::Idle,
            url: None,
            headers: Header::new(),
            body: None,
            multipart: None,
            parameters: None,
            timeout: None,
            proxies: Proxies::new(),
            proxy_auth: ProxyAuth::new(),
            write_callback: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Apply one option descriptor. Later values for the same concern replace
    /// earlier ones, except that a body and a multipart form are exclusive.
    pub fn apply(&mut self, option: impl Into<RequestOption>) -> Result<()> {
        self.ensure_unexecuted()?;
        match option.into() {
            RequestOption::Url(url) => self.url = Some(url),
            RequestOption::Header(headers) => self.headers = headers,
            RequestOption::Body(body) => {
                if self.multipart.is_some() {
                    return Err(ClientError::Config(
                        "a session takes either a body or a multipart form, not both".to_string(),
                    ));
                }
                self.body = Some(body);
            }
            RequestOption::Multipart(multipart) => {
                if self.body.is_some() {
                    return Err(ClientError::Config(
                        "a session takes either a body or a multipart form, not both".to_string(),
                    ));
                }
                self.multipart = Some(multipart);
            }
            RequestOption::Parameters(parameters) => self.parameters = Some(parameters),
            RequestOption::Timeout(timeout) => self.timeout = Some(timeout),
            RequestOption::Proxies(proxies) => self.proxies = proxies,
            RequestOption::ProxyAuth(proxy_auth) => self.proxy_auth = proxy_auth,
            RequestOption::WriteCallback(callback) => self.write_callback = Some(callback),
        }
        self.state = SessionState::Configured;
        Ok(())
    }

    /// Apply every option in order.
    pub fn apply_all(&mut self, options: impl IntoIterator<Item = RequestOption>) -> Result<()> {
        options.into_iter().try_for_each(|option| self.apply(option))
    }

    /// Builder form of [`Session::apply`].
    pub fn with(mut self, option: impl Into<RequestOption>) -> Result<Self> {
        self.apply(option)?;
        Ok(self)
    }

    /// GET without a body, even if one was applied.
    pub async fn get(&mut self) -> Result<RawResult> {
        self.execute(Method::Get, false, None).await
    }

    /// GET that carries the applied body, for APIs that require one.
    pub async fn get_with_body(&mut self) -> Result<RawResult> {
        self.execute(Method::Get, true, None).await
    }

    /// POST the applied body or form; an empty body when none was applied.
    pub async fn post(&mut self) -> Result<RawResult> {
        self.execute(Method::Post, true, None).await
    }

    /// DELETE, always without a body.
    pub async fn delete(&mut self) -> Result<RawResult> {
        self.execute(Method::Delete, false, None).await
    }

    /// GET and write the body straight into `path`.
    ///
    /// The file is created only on a 200 response, and the result then carries
    /// no content. Any other response is buffered and `path` is left alone.
    pub async fn download(&mut self, path: impl AsRef<Path>) -> Result<RawResult> {
        self.execute(Method::Get, false, Some(path.as_ref())).await
    }

    /// Execute `method` and hand the unread body to the caller.
    ///
    /// GET and POST carry the applied body, DELETE never does. A write
    /// callback cannot be combined with a streamed body.
    pub async fn stream(&mut self, method: Method) -> Result<ResponseStream> {
        self.ensure_unexecuted()?;
        if self.write_callback.is_some() {
            return Err(ClientError::Config(
                "a write callback cannot be combined with a streamed response".to_string(),
            ));
        }
        self.state = SessionState::Executing;
        let result = self.open(method, method != Method::Delete).await;
        self.state = match result {
            Ok(_) => SessionState::Completed,
            Err(_) => SessionState::Failed,
        };
        let (response, _) = result?;
        Ok(ResponseStream::new(
            response.status_code,
            response.status_line,
            response.reason,
            response.url,
            response.headers,
            response.body,
        ))
    }

    async fn execute(
        &mut self,
        method: Method,
        include_body: bool,
        download: Option<&Path>,
    ) -> Result<RawResult> {
        self.ensure_unexecuted()?;
        self.state = SessionState::Executing;
        let result = self.perform(method, include_body, download).await;
        self.state = match result {
            Ok(_) => SessionState::Completed,
            Err(_) => SessionState::Failed,
        };
        result
    }

    async fn perform(
        &mut self,
        method: Method,
        include_body: bool,
        download: Option<&Path>,
    ) -> Result<RawResult> {
        let sink = match (download, self.write_callback.take()) {
            (Some(path), _) => Sink::File(path),
            (None, Some(callback)) => Sink::Callback(callback),
            (None, None) => Sink::Buffer,
        };

        let (
            TransportResponse {
                status_code,
                status_line,
                reason,
                url,
                headers,
                body,
            },
            started,
        ) = self.open(method, include_body).await?;

        // The target file is only touched by a successful download.
        let sink = match sink {
            Sink::File(_) if status_code != 200 => Sink::Buffer,
            sink => sink,
        };
        let content = drain(body, sink).await?;
        let elapsed = started.elapsed();
        trace!(status = status_code, elapsed_ms = elapsed.as_millis() as u64, "request completed");

        Ok(RawResult {
            status_code,
            elapsed,
            status_line,
            content,
            url,
            reason,
            headers,
        })
    }

    /// Prepare and send the request, returning the response with the instant
    /// it was handed to the transport.
    async fn open(
        &mut self,
        method: Method,
        include_body: bool,
    ) -> Result<(TransportResponse, Instant)> {
        let request = self.prepare(method, include_body).await?;
        debug!(method = %request.method, url = %request.url, "sending request");
        let started = Instant::now();
        let response = self.transport.send(request).await?;
        Ok((response, started))
    }

    async fn prepare(&mut self, method: Method, include_body: bool) -> Result<PreparedRequest> {
        let url = self
            .url
            .take()
            .ok_or_else(|| ClientError::Config("no URL applied to session".to_string()))?;

        let mut target = url.as_str().to_string();
        if let Some(parameters) = self.parameters.take().filter(|p| !p.is_empty()) {
            target.push(if target.contains('?') { '&' } else { '?' });
            target.push_str(&parameters.build_parameter_string());
        }

        let parsed = reqwest::Url::parse(&target)
            .map_err(|e| ClientError::Transport(format!("invalid URL '{target}': {e}")))?;
        let scheme = parsed.scheme();
        let proxy = self.proxies.get(scheme).map(|proxy_url| ProxyConfig {
            url: proxy_url.to_string(),
            credentials: self.proxy_auth.get(scheme).cloned(),
        });

        let body = match (include_body, self.body.take(), self.multipart.take()) {
            (true, Some(body), _) => RequestBody::Bytes(body.into_bytes()),
            (true, None, Some(multipart)) => RequestBody::Form(load_form(&multipart).await?),
            (true, None, None) => RequestBody::Empty,
            (false, body, multipart) => {
                if body.is_some() || multipart.is_some() {
                    trace!(method = %method, "dropping body for bodiless request");
                }
                RequestBody::Empty
            }
        };

        let mut headers = std::mem::take(&mut self.headers);
        headers.remove("Expect");

        Ok(PreparedRequest {
            method,
            url: target,
            headers,
            body,
            timeout: self.timeout,
            proxy,
        })
    }

    fn ensure_unexecuted(&self) -> Result<()> {
        match self.state {
            SessionState::Idle | SessionState::Configured => Ok(()),
            state => Err(ClientError::Config(format!(
                "session already executed (state: {state:?})"
            ))),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("multipart", &self.multipart)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Validate and read every file part before anything touches the network.
async fn load_form(multipart: &Multipart) -> Result<Vec<FormPart>> {
    let mut parts = Vec::with_capacity(multipart.parts().len());
    for part in multipart.parts() {
        match &part.data {
            PartData::Value(value) => parts.push(FormPart {
                name: part.name.clone(),
                data: FormData::Text(value.clone()),
                content_type: part.content_type.clone(),
            }),
            PartData::Buffer { data, filename } => parts.push(FormPart {
                name: part.name.clone(),
                data: FormData::Bytes {
                    data: data.clone(),
                    filename: filename.clone(),
                },
                content_type: part.content_type.clone(),
            }),
            PartData::Files(paths) => {
                for path in paths.iter() {
                    validate_file(path)?;
                    let data = tokio::fs::read(path)
                        .await
                        .map_err(|e| ClientError::file(path, e.to_string()))?;
                    parts.push(FormPart {
                        name: part.name.clone(),
                        data: FormData::Bytes {
                            data: Bytes::from(data),
                            filename: path
                                .file_name()
                                .map(|name| name.to_string_lossy().into_owned()),
                        },
                        content_type: part.content_type.clone(),
                    });
                }
            }
        }
    }
    Ok(parts)
}

/// Consume `body` into `sink`. Only the buffer sink produces content.
async fn drain(mut body: ByteStream, sink: Sink<'_>) -> Result<Bytes> {
    match sink {
        Sink::Buffer => {
            let mut buffer = BytesMut::new();
            while let Some(chunk) = body.next().await {
                buffer.extend_from_slice(&chunk?);
            }
            Ok(buffer.freeze())
        }
        Sink::Callback(mut callback) => {
            while let Some(chunk) = body.next().await {
                if !callback.call(&chunk?) {
                    debug!("write callback aborted the transfer");
                    break;
                }
            }
            Ok(Bytes::new())
        }
        Sink::File(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .map_err(|e| ClientError::file(path, e.to_string()))?;
            while let Some(chunk) = body.next().await {
                file.write_all(&chunk?)
                    .await
                    .map_err(|e| ClientError::file(path, e.to_string()))?;
            }
            file.flush()
                .await
                .map_err(|e| ClientError::file(path, e.to_string()))?;
            Ok(Bytes::new())
        }
    }
}
