//! Option descriptors that configure a single request.
//!
//! Every tunable aspect of a request is its own value. Descriptors are
//! built independently and handed to a [`Session`](crate::session::Session)
//! in any order, either directly or through the [`RequestOption`] enum.
//!
//! # Example
//! ```rust
//! use oaiclient::options::{Body, Header, Parameters, RequestOption, Url};
//!
//! let options: Vec<RequestOption> = vec![
//!     Url::new("https://api.openai.com/v1", "/models").into(),
//!     Header::new().with("OpenAI-Beta", "assistants=v2").into(),
//!     Parameters::new().with("limit", "20").into(),
//!     Body::from(r#"{"model":"gpt-4o"}"#).into(),
//! ];
//! assert_eq!(options.len(), 4);
//! ```

use bytes::Bytes;
use itertools::Itertools;
use nonempty::NonEmpty;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Target URL of a request, `root` followed by `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url(String);

impl Url {
    /// Concatenate `root` and `path`. No validation happens here.
    pub fn new(root: impl AsRef<str>, path: impl AsRef<str>) -> Self {
        Self(format!("{}{}", root.as_ref(), path.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Url {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Url {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A set of HTTP headers.
///
/// Names compare case-insensitively and the last write for a name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    entries: Vec<(String, String)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any existing value for the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => *entry = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    /// Builder form of [`Header::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index).1)
    }

    /// Merge `other` into `self`; entries from `other` win on conflict.
    pub fn merge(&mut self, other: &Header) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Header {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut header = Header::new();
        for (name, value) in iter {
            header.insert(name, value);
        }
        header
    }
}

impl From<HashMap<String, String>> for Header {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

/// Check that `path` names a non-empty regular file.
pub fn validate_file(path: &Path) -> Result<()> {
    let metadata =
        std::fs::metadata(path).map_err(|_| ClientError::file(path, "file does not exist"))?;
    if !metadata.is_file() {
        return Err(ClientError::file(path, "not a regular file"));
    }
    if metadata.len() == 0 {
        return Err(ClientError::file(path, "file is empty"));
    }
    Ok(())
}

/// Raw request body.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Body(Bytes);

impl Body {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Serialize `value` as a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self(Bytes::from(serde_json::to_vec(value)?)))
    }

    /// Read the whole file into memory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        validate_file(path)?;
        let data = std::fs::read(path).map_err(|e| ClientError::file(path, e.to_string()))?;
        Ok(Self(Bytes::from(data)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Body({} bytes)", self.0.len())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self(Bytes::from(value.to_string()))
    }
}

/// Payload of one multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartData {
    /// Plain text value.
    Value(String),
    /// One or more files, each sent as its own part under the same name.
    Files(NonEmpty<PathBuf>),
    /// In-memory bytes; the length travels with the buffer so binary data is safe.
    Buffer {
        data: Bytes,
        filename: Option<String>,
    },
}

/// One named field of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub data: PartData,
    pub content_type: Option<String>,
}

impl Part {
    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_data(name, PartData::Value(value.into()))
    }

    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::with_data(name, PartData::Files(NonEmpty::new(path.into())))
    }

    pub fn files(name: impl Into<String>, paths: NonEmpty<PathBuf>) -> Self {
        Self::with_data(name, PartData::Files(paths))
    }

    pub fn buffer(name: impl Into<String>, data: impl Into<Bytes>, filename: impl Into<String>) -> Self {
        Self::with_data(
            name,
            PartData::Buffer {
                data: data.into(),
                filename: Some(filename.into()),
            },
        )
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn is_file(&self) -> bool {
        matches!(self.data, PartData::Files(_))
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self.data, PartData::Buffer { .. })
    }

    fn with_data(name: impl Into<String>, data: PartData) -> Self {
        Self {
            name: name.into(),
            data,
            content_type: None,
        }
    }
}

/// Ordered list of multipart fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Multipart {
    parts: Vec<Part>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    pub fn push(&mut self, part: Part) {
        self.parts.push(part);
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl FromIterator<Part> for Multipart {
    fn from_iter<I: IntoIterator<Item = Part>>(iter: I) -> Self {
        Self {
            parts: iter.into_iter().collect(),
        }
    }
}

/// Ordered query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(Vec<(String, String)>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(key, value);
        self
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as `k1=v1&k2=v2`, percent-encoding keys and values.
    ///
    /// # Example
    /// ```
    /// use oaiclient::options::Parameters;
    ///
    /// assert_eq!(Parameters::new().with("k", "v").build_parameter_string(), "k=v");
    /// ```
    pub fn build_parameter_string(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .join("&")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Request timeout with millisecond resolution. Zero disables the limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timeout {
    millis: u64,
}

impl Timeout {
    pub const fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.millis)
    }

    pub fn is_unlimited(&self) -> bool {
        self.millis == 0
    }
}

impl TryFrom<i64> for Timeout {
    type Error = ClientError;

    fn try_from(millis: i64) -> Result<Self> {
        u64::try_from(millis)
            .map(Self::from_millis)
            .map_err(|_| ClientError::Config(format!("timeout underflow: {millis}ms is negative")))
    }
}

impl TryFrom<Duration> for Timeout {
    type Error = ClientError;

    fn try_from(duration: Duration) -> Result<Self> {
        u64::try_from(duration.as_millis())
            .map(Self::from_millis)
            .map_err(|_| {
                ClientError::Config(format!(
                    "timeout overflow: {}ms does not fit the transport's millisecond range",
                    duration.as_millis()
                ))
            })
    }
}

/// Proxy URLs keyed by URL scheme (`http`, `https`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proxies(HashMap<String, String>);

impl Proxies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, scheme: impl Into<String>, url: impl Into<String>) -> Self {
        self.insert(scheme, url);
        self
    }

    pub fn insert(&mut self, scheme: impl Into<String>, url: impl Into<String>) {
        self.0.insert(scheme.into().to_ascii_lowercase(), url.into());
    }

    pub fn get(&self, scheme: &str) -> Option<&str> {
        self.0.get(&scheme.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Proxies {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut proxies = Proxies::new();
        for (scheme, url) in iter {
            proxies.insert(scheme, url);
        }
        proxies
    }
}

/// Username and password for one proxy.
#[derive(Clone)]
pub struct ProxyCredentials {
    username: String,
    password: SecretString,
}

impl ProxyCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Proxy credentials keyed by URL scheme.
#[derive(Debug, Clone, Default)]
pub struct ProxyAuth(HashMap<String, ProxyCredentials>);

impl ProxyAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, scheme: impl Into<String>, credentials: ProxyCredentials) -> Self {
        self.insert(scheme, credentials);
        self
    }

    pub fn insert(&mut self, scheme: impl Into<String>, credentials: ProxyCredentials) {
        self.0.insert(scheme.into().to_ascii_lowercase(), credentials);
    }

    pub fn get(&self, scheme: &str) -> Option<&ProxyCredentials> {
        self.0.get(&scheme.to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sink invoked once per received body chunk.
///
/// Returning `false` aborts the transfer. A request with a callback never
/// buffers its body into the response.
pub struct WriteCallback(Box<dyn FnMut(&[u8]) -> bool + Send>);

impl WriteCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&[u8]) -> bool + Send + 'static,
    {
        Self(Box::new(callback))
    }

    pub(crate) fn call(&mut self, chunk: &[u8]) -> bool {
        (self.0)(chunk)
    }
}

impl fmt::Debug for WriteCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WriteCallback(..)")
    }
}

/// Any option descriptor a session accepts.
#[derive(Debug)]
pub enum RequestOption {
    Url(Url),
    Header(Header),
    Body(Body),
    Multipart(Multipart),
    Parameters(Parameters),
    Timeout(Timeout),
    Proxies(Proxies),
    ProxyAuth(ProxyAuth),
    WriteCallback(WriteCallback),
}

macro_rules! into_request_option {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<$ty> for RequestOption {
                fn from(value: $ty) -> Self {
                    RequestOption::$ty(value)
                }
            }
        )*
    };
}

into_request_option!(
    Url,
    Header,
    Body,
    Multipart,
    Parameters,
    Timeout,
    Proxies,
    ProxyAuth,
    WriteCallback,
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_url_concatenates_without_validation() {
        assert_eq!(
            Url::new("https://api.openai.com/v1", "/models").as_str(),
            "https://api.openai.com/v1/models"
        );
        assert_eq!(Url::new("not a url", "").as_str(), "not a url");
    }

    #[test]
    fn test_header_is_case_insensitive_and_last_write_wins() {
        let mut header = Header::new().with("Content-Type", "application/json");
        header.insert("content-type", "multipart/form-data");

        assert_eq!(header.len(), 1);
        assert_eq!(header.get("CONTENT-TYPE"), Some("multipart/form-data"));
        assert_eq!(header.remove("Content-type").as_deref(), Some("multipart/form-data"));
        assert!(header.is_empty());
    }

    #[test]
    fn test_header_merge_prefers_other() {
        let mut base = Header::new()
            .with("Content-Type", "application/json")
            .with("Authorization", "Bearer a");
        base.merge(&Header::new().with("authorization", "Bearer b"));

        assert_eq!(base.len(), 2);
        assert_eq!(base.get("Authorization"), Some("Bearer b"));
    }

    #[test]
    fn test_single_parameter_has_no_separator() {
        let params = Parameters::new().with("k", "v");
        assert_eq!(params.build_parameter_string(), "k=v");
    }

    #[test]
    fn test_two_parameters_joined_once() {
        let params: Parameters = [("k1", "v1"), ("k2", "v2")].into_iter().collect();
        assert_eq!(params.build_parameter_string(), "k1=v1&k2=v2");
    }

    #[test]
    fn test_parameters_are_encoded() {
        let params = Parameters::new().with("after", "file abc&x");
        assert_eq!(params.build_parameter_string(), "after=file%20abc%26x");
        assert_eq!(Parameters::new().build_parameter_string(), "");
    }

    #[test]
    fn test_timeout_conversions_reject_out_of_range() {
        assert_eq!(Timeout::try_from(1500_i64).unwrap().as_millis(), 1500);
        assert!(matches!(Timeout::try_from(-1_i64), Err(ClientError::Config(_))));
        assert!(matches!(
            Timeout::try_from(Duration::MAX),
            Err(ClientError::Config(_))
        ));
        assert_eq!(
            Timeout::try_from(Duration::from_secs(2)).unwrap(),
            Timeout::from_millis(2000)
        );
        assert!(Timeout::default().is_unlimited());
    }

    #[test]
    fn test_body_from_missing_file_is_file_error() {
        let result = Body::from_file("/definitely/not/here.jsonl");
        assert!(matches!(result, Err(ClientError::File { .. })));
    }

    #[test]
    fn test_body_from_empty_file_is_file_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = Body::from_file(file.path());
        assert!(matches!(result, Err(ClientError::File { reason, .. }) if reason == "file is empty"));
    }

    #[test]
    fn test_body_from_file_reads_everything() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"prompt\":\"hi\"}\n").unwrap();

        let body = Body::from_file(file.path()).unwrap();
        assert_eq!(body.as_bytes(), b"{\"prompt\":\"hi\"}\n");
    }

    #[test]
    fn test_directory_is_not_a_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate_file(dir.path());
        assert!(matches!(result, Err(ClientError::File { reason, .. }) if reason == "not a regular file"));
    }

    #[test]
    fn test_part_kinds_are_exclusive() {
        let value = Part::value("purpose", "fine-tune");
        let file = Part::file("file", "/tmp/data.jsonl");
        let buffer = Part::buffer("file", vec![0u8, 159, 146, 150], "audio.mp3")
            .with_content_type("audio/mpeg");

        assert!(!value.is_file() && !value.is_buffer());
        assert!(file.is_file() && !file.is_buffer());
        assert!(buffer.is_buffer() && !buffer.is_file());
        assert_eq!(buffer.content_type.as_deref(), Some("audio/mpeg"));
    }

    #[test]
    fn test_proxies_keyed_by_scheme() {
        let proxies = Proxies::new().with("HTTPS", "http://proxy.local:3128");
        assert_eq!(proxies.get("https"), Some("http://proxy.local:3128"));
        assert_eq!(proxies.get("http"), None);
    }

    #[test]
    fn test_proxy_credentials_are_redacted() {
        let creds = ProxyCredentials::new("alice", "hunter2");
        assert_eq!(creds.password(), "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn test_write_callback_forwards_chunks() {
        let mut seen = Vec::new();
        let (tx, rx) = std::sync::mpsc::channel();
        let mut callback = WriteCallback::new(move |chunk| {
            tx.send(chunk.to_vec()).is_ok()
        });

        assert!(callback.call(b"abc"));
        seen.extend(rx.try_iter());
        assert_eq!(seen, vec![b"abc".to_vec()]);
    }
}
