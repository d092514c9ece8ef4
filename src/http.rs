//! `reqwest`-backed transport.
//!
//! Every request gets its own `reqwest::Client` with idle pooling disabled,
//! so one session owns one connection for exactly one exchange.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, EXPECT};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::options::Header;
use crate::transport::{
    FormData, FormPart, Method, PreparedRequest, RequestBody, Transport, TransportResponse,
};

/// Build a single-use HTTP client for `request`.
///
/// Applies the timeout and the proxy resolved for the request's scheme.
/// Without a proxy the client ignores proxy environment variables.
pub fn build_http_client(request: &PreparedRequest) -> Result<Client> {
    let mut builder = Client::builder().pool_max_idle_per_host(0);

    if let Some(timeout) = request.timeout.filter(|timeout| !timeout.is_unlimited()) {
        builder = builder.timeout(timeout.as_duration());
    }

    builder = match &request.proxy {
        Some(proxy) => {
            let mut config = reqwest::Proxy::all(&proxy.url).map_err(|e| {
                ClientError::Transport(format!("invalid proxy '{}': {e}", proxy.url))
            })?;
            if let Some(credentials) = &proxy.credentials {
                config = config.basic_auth(credentials.username(), credentials.password());
            }
            builder.proxy(config)
        }
        None => builder.no_proxy(),
    };

    builder
        .build()
        .map_err(|e| ClientError::Transport(format!("failed to build HTTP client: {e}")))
}

/// Convert a header set into a `HeaderMap`, dropping any `Expect` header.
pub fn to_header_map(headers: &Header) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::Transport(format!("invalid header name '{name}': {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::Transport(format!("invalid value for header '{name}': {e}")))?;
        map.insert(header_name, header_value);
    }
    map.remove(EXPECT);
    Ok(map)
}

/// Convert response headers back into a header set, skipping non UTF-8 values.
pub fn from_header_map(headers: &HeaderMap) -> Header {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn build_form(parts: Vec<FormPart>) -> Result<Form> {
    let mut form = Form::new();
    for FormPart {
        name,
        data,
        content_type,
    } in parts
    {
        let mut part = match data {
            FormData::Text(text) => Part::text(text),
            FormData::Bytes { data, filename } => {
                let part = Part::bytes(data.to_vec());
                match filename {
                    Some(filename) => part.file_name(filename),
                    None => part,
                }
            }
        };
        if let Some(content_type) = content_type {
            part = part.mime_str(&content_type).map_err(|e| {
                ClientError::Transport(format!("invalid content type '{content_type}': {e}"))
            })?;
        }
        form = form.part(name, part);
    }
    Ok(form)
}

/// Transport that performs requests with `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: PreparedRequest) -> Result<TransportResponse> {
        let client = build_http_client(&request)?;
        let mut headers = to_header_map(&request.headers)?;

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };
        let url = request.url;

        // The form sets its own content type carrying the boundary.
        if matches!(request.body, RequestBody::Form(_)) {
            headers.remove(CONTENT_TYPE);
        }

        let mut builder = client.request(method, &url).headers(headers);
        builder = match request.body {
            RequestBody::Empty if request.method == Method::Post => builder.body(Vec::new()),
            RequestBody::Empty => builder,
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Form(parts) => builder.multipart(build_form(parts)?),
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() => {
                warn!(url = %url, error = %e, "no response received");
                return Ok(TransportResponse::no_response(url, e.to_string()));
            }
            Err(e) => return Err(ClientError::Transport(e.to_string())),
        };

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "response headers received");

        Ok(TransportResponse {
            status_code: status.as_u16(),
            status_line: format!("{:?} {}", response.version(), status),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            url: response.url().to_string(),
            headers: from_header_map(response.headers()),
            body: Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(ClientError::from))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ProxyCredentials, Timeout};
    use crate::transport::ProxyConfig;

    fn prepared(proxy: Option<ProxyConfig>) -> PreparedRequest {
        PreparedRequest {
            method: Method::Get,
            url: "https://api.openai.com/v1/models".to_string(),
            headers: Header::new(),
            body: RequestBody::Empty,
            timeout: Some(Timeout::from_millis(30_000)),
            proxy,
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&prepared(None)).is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let proxy = ProxyConfig {
            url: "http://proxy.example.com:8080".to_string(),
            credentials: Some(ProxyCredentials::new("user", "pass")),
        };
        assert!(build_http_client(&prepared(Some(proxy))).is_ok());
    }

    #[test]
    fn test_invalid_proxy_is_transport_error() {
        let proxy = ProxyConfig {
            url: "http://bad host:8080".to_string(),
            credentials: None,
        };
        assert!(matches!(
            build_http_client(&prepared(Some(proxy))),
            Err(ClientError::Transport(_))
        ));
    }

    #[test]
    fn test_expect_header_is_cleared() {
        let headers = Header::new()
            .with("Expect", "100-continue")
            .with("Content-Type", "application/json");
        let map = to_header_map(&headers).unwrap();
        assert!(map.get(EXPECT).is_none());
        assert_eq!(map.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_invalid_header_is_transport_error() {
        let headers = Header::new().with("bad header", "x");
        assert!(matches!(to_header_map(&headers), Err(ClientError::Transport(_))));
    }

    #[test]
    fn test_header_map_round_trip() {
        let mut map = HeaderMap::new();
        map.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let header = from_header_map(&map);
        assert_eq!(header.get("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn test_form_rejects_bad_mime() {
        let parts = vec![FormPart {
            name: "file".to_string(),
            data: FormData::Text("x".to_string()),
            content_type: Some("not a mime".to_string()),
        }];
        assert!(matches!(build_form(parts), Err(ClientError::Transport(_))));
    }
}
