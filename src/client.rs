//! Request façade and execution modes.
//!
//! [`Client`] is the single entry point endpoint wrappers call through. Each
//! call builds one [`Session`], seeds it with the authorization defaults,
//! executes exactly one verb and classifies the result.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::auth::Authorization;
use crate::error::{ClientError, Result};
use crate::http::ReqwestTransport;
use crate::options::{Header, RequestOption, Url};
use crate::response::{classify, RawResult, Response};
use crate::session::Session;
use crate::stream::ResponseStream;
use crate::transport::{Method, Transport};

const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Description of one call through the façade.
///
/// # Example
/// ```rust
/// use oaiclient::client::Request;
/// use oaiclient::options::{Body, Header};
///
/// let request = Request::post("https://api.openai.com/v1", "/embeddings")
///     .headers(Header::new().with("OpenAI-Beta", "assistants=v2"))
///     .option(Body::from(r#"{"model":"text-embedding-3-small","input":"hi"}"#));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    root: String,
    path: String,
    content_type: String,
    headers: Option<Header>,
    options: Vec<RequestOption>,
}

impl Request {
    pub fn new(method: Method, root: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            root: root.into(),
            path: path.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            headers: None,
            options: Vec::new(),
        }
    }

    pub fn get(root: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::Get, root, path)
    }

    pub fn post(root: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::Post, root, path)
    }

    pub fn delete(root: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::Delete, root, path)
    }

    /// Override the `Content-Type` seeded into the headers (default `application/json`).
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Extra headers; these win over the defaults.
    pub fn headers(mut self, headers: Header) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn option(mut self, option: impl Into<RequestOption>) -> Self {
        self.options.push(option.into());
        self
    }

    pub fn options(mut self, options: impl IntoIterator<Item = RequestOption>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }
}

/// Façade over sessions, sharing one [`Authorization`] and one [`Transport`].
///
/// Cloning is cheap; clones share the same configuration.
///
/// # Example
/// ```rust,no_run
/// use oaiclient::auth::Authorization;
/// use oaiclient::client::{Client, Request};
/// use oaiclient::options::Body;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::new(Authorization::from_env()?);
///     let response = client
///         .request(
///             Request::post("https://api.openai.com/v1", "/chat/completions")
///                 .option(Body::from(r#"{"model":"gpt-4o","messages":[]}"#)),
///         )
///         .await?;
///     println!("{}", response["id"]);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    auth: Arc<Authorization>,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Create a client backed by [`ReqwestTransport`].
    pub fn new(auth: Authorization) -> Self {
        Self::with_transport(auth, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(auth: impl Into<Arc<Authorization>>, transport: Arc<dyn Transport>) -> Self {
        Self {
            auth: auth.into(),
            transport,
        }
    }

    pub fn authorization(&self) -> &Authorization {
        &self.auth
    }

    /// Perform `request` and classify its response.
    ///
    /// Exactly one network execution happens per call; nothing is retried
    /// or cached. A GET carrying a [`Body`](crate::options::Body) option
    /// sends that body.
    pub async fn request(&self, request: Request) -> Result<Response> {
        let method = request.method;
        let mut session = self.session(request)?;
        let raw = match method {
            Method::Get => session.get_with_body().await?,
            Method::Post => session.post().await?,
            Method::Delete => session.delete().await?,
        };
        debug!(method = %method, status = raw.status_code, url = %raw.url, "request finished");
        Response::new(raw)
    }

    /// Blocking form of [`Client::request`].
    ///
    /// Runs the request on a private current-thread runtime, so it must not
    /// be called from within an async context.
    pub fn request_blocking(&self, request: Request) -> Result<Response> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to start runtime: {e}")))?;
        runtime.block_on(self.request(request))
    }

    /// Run `request` as a task on the tokio worker pool.
    ///
    /// The returned handle resolves once with the response or the error the
    /// request produced. Deferred calls cannot be cancelled and are not
    /// ordered relative to each other. Outside a tokio runtime the request
    /// runs on its own worker thread instead.
    pub fn request_deferred(&self, request: Request) -> Deferred {
        let client = self.clone();
        match Handle::try_current() {
            Ok(handle) => Deferred {
                inner: DeferredInner::Task(
                    handle.spawn(async move { client.request(request).await }),
                ),
            },
            Err(_) => {
                let (sender, receiver) = oneshot::channel();
                let spawned = std::thread::Builder::new()
                    .name("oaiclient-deferred".to_string())
                    .spawn(move || {
                        let _ = sender.send(client.request_blocking(request));
                    });
                if let Err(e) = spawned {
                    warn!(error = %e, "failed to start deferred request thread");
                }
                Deferred {
                    inner: DeferredInner::Thread(receiver),
                }
            }
        }
    }

    /// Stream the body of `url` into the file at `to`.
    ///
    /// Returns `true` only when the server answered 200, and only then is the
    /// file written. Other responses are not classified and return `false`.
    /// A missing response is a [`ClientError::Connection`].
    pub async fn download(
        &self,
        url: impl Into<Url>,
        to: impl AsRef<Path>,
        headers: Option<Header>,
    ) -> Result<bool> {
        let mut session = Session::new(self.transport.clone());
        self.apply_defaults(&mut session)?;
        session.apply(url.into())?;

        let mut merged = self.auth.authorization_headers();
        if let Some(headers) = headers {
            merged.merge(&headers);
        }
        session.apply(merged)?;

        let raw = session.download(to).await?;
        debug!(status = raw.status_code, url = %raw.url, "download finished");
        if raw.status_code == 0 {
            classify(&raw, &Value::Null)?;
        }
        Ok(raw.status_code == 200)
    }

    /// Perform `request` and hand back the body as a lazy stream.
    ///
    /// Non-2xx responses are read fully and returned as classified errors.
    pub async fn stream(&self, request: Request) -> Result<ResponseStream> {
        let method = request.method;
        let mut session = self.session(request)?;
        let stream = session.stream(method).await?;

        if (200..300).contains(&stream.status_code()) {
            return Ok(stream);
        }
        Err(into_error(stream).await)
    }

    fn session(&self, request: Request) -> Result<Session> {
        let Request {
            root,
            path,
            content_type,
            headers,
            options,
            ..
        } = request;

        let mut merged = Header::new().with("Content-Type", content_type);
        merged.merge(&self.auth.authorization_headers());
        if let Some(headers) = headers {
            merged.merge(&headers);
        }

        let mut session = Session::new(self.transport.clone());
        session.apply(Url::new(root, path))?;
        self.apply_defaults(&mut session)?;
        for option in options {
            match option {
                RequestOption::Header(headers) => merged.merge(&headers),
                option => session.apply(option)?,
            }
        }
        session.apply(merged)?;
        Ok(session)
    }

    fn apply_defaults(&self, session: &mut Session) -> Result<()> {
        if !self.auth.proxies().is_empty() {
            session.apply(self.auth.proxies().clone())?;
        }
        if !self.auth.proxy_auth().is_empty() {
            session.apply(self.auth.proxy_auth().clone())?;
        }
        if let Some(timeout) = self.auth.max_timeout() {
            session.apply(timeout)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

async fn into_error(stream: ResponseStream) -> ClientError {
    use futures::StreamExt;

    let status_code = stream.status_code();
    let status_line = stream.status_line().to_string();
    let reason = stream.reason().to_string();
    let url = stream.url().to_string();
    let headers = stream.headers().clone();

    let mut content = Vec::new();
    let mut body = stream.into_body();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(chunk) => content.extend_from_slice(&chunk),
            Err(e) => return e,
        }
    }

    let raw = RawResult {
        status_code,
        status_line,
        content: content.into(),
        url,
        reason,
        headers,
        ..Default::default()
    };
    match Response::new(raw) {
        Err(e) => e,
        Ok(response) => ClientError::BadRequest {
            status: response.status_code(),
            message: response.reason().to_string(),
        },
    }
}

/// Handle to a request running on the worker pool.
///
/// Await it (or call [`Deferred::wait`]) to get the outcome.
#[derive(Debug)]
pub struct Deferred {
    inner: DeferredInner,
}

#[derive(Debug)]
enum DeferredInner {
    Task(JoinHandle<Result<Response>>),
    Thread(oneshot::Receiver<Result<Response>>),
}

impl Deferred {
    pub async fn wait(self) -> Result<Response> {
        self.await
    }
}

impl Future for Deferred {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            DeferredInner::Task(handle) => Pin::new(handle).poll(cx).map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(ClientError::Transport(format!("deferred request failed: {e}")))
                })
            }),
            DeferredInner::Thread(receiver) => Pin::new(receiver).poll(cx).map(|received| {
                received.unwrap_or_else(|_| {
                    Err(ClientError::Transport(
                        "deferred request ended without a result".to_string(),
                    ))
                })
            }),
        }
    }
}
