//! Credentials and per-process transport defaults consumed by every request.

use secrecy::{ExposeSecret, SecretString};

use crate::error::{ClientError, Result};
use crate::options::{Header, ProxyAuth, ProxyCredentials, Proxies, Timeout};

/// Authorization and transport defaults shared by all requests of a client.
///
/// Secrets are kept in [`SecretString`], which zeroes its memory when
/// dropped. The wipe is best effort: copies made by the allocator or the OS
/// are outside its reach.
///
/// # Example
/// ```rust
/// use oaiclient::auth::Authorization;
/// use oaiclient::options::{Proxies, Timeout};
///
/// let auth = Authorization::new()
///     .with_key("sk-test")
///     .with_organization("org-123")
///     .with_proxies(Proxies::new().with("https", "http://proxy.local:3128"))
///     .with_max_timeout(Timeout::from_millis(30_000));
///
/// let headers = auth.authorization_headers();
/// assert_eq!(headers.get("Authorization"), Some("Bearer sk-test"));
/// assert_eq!(headers.get("OpenAI-Organization"), Some("org-123"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Authorization {
    api_key: Option<SecretString>,
    organization: Option<String>,
    azure_key: Option<SecretString>,
    azure_ad_token: Option<SecretString>,
    proxies: Proxies,
    proxy_auth: ProxyAuth,
    max_timeout: Option<Timeout>,
}

impl Authorization {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read credentials from `OPENAI_API_KEY`, `OPENAI_ORG_ID` and `AZURE_API_KEY`.
    ///
    /// Fails when none of them is set.
    pub fn from_env() -> Result<Self> {
        let mut auth = Self::new();
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            auth.set_key(key);
        }
        if let Ok(org) = std::env::var("OPENAI_ORG_ID") {
            auth.set_organization(org);
        }
        if let Ok(key) = std::env::var("AZURE_API_KEY") {
            auth.set_azure_key(key);
        }
        if !auth.has_credentials() {
            return Err(ClientError::Config(
                "no API key found in OPENAI_API_KEY or AZURE_API_KEY".to_string(),
            ));
        }
        Ok(auth)
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.api_key = Some(SecretString::from(key.into()));
    }

    pub fn set_organization(&mut self, organization: impl Into<String>) {
        self.organization = Some(organization.into());
    }

    pub fn set_azure_key(&mut self, key: impl Into<String>) {
        self.azure_key = Some(SecretString::from(key.into()));
    }

    pub fn set_azure_ad_token(&mut self, token: impl Into<String>) {
        self.azure_ad_token = Some(SecretString::from(token.into()));
    }

    pub fn set_proxies(&mut self, proxies: Proxies) {
        self.proxies = proxies;
    }

    pub fn set_proxy_credentials(&mut self, scheme: impl Into<String>, credentials: ProxyCredentials) {
        self.proxy_auth.insert(scheme, credentials);
    }

    pub fn set_max_timeout(&mut self, timeout: Timeout) {
        self.max_timeout = Some(timeout);
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.set_key(key);
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.set_organization(organization);
        self
    }

    pub fn with_azure_key(mut self, key: impl Into<String>) -> Self {
        self.set_azure_key(key);
        self
    }

    pub fn with_azure_ad_token(mut self, token: impl Into<String>) -> Self {
        self.set_azure_ad_token(token);
        self
    }

    pub fn with_proxies(mut self, proxies: Proxies) -> Self {
        self.set_proxies(proxies);
        self
    }

    pub fn with_proxy_credentials(mut self, scheme: impl Into<String>, credentials: ProxyCredentials) -> Self {
        self.set_proxy_credentials(scheme, credentials);
        self
    }

    pub fn with_max_timeout(mut self, timeout: Timeout) -> Self {
        self.set_max_timeout(timeout);
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() || self.azure_key.is_some() || self.azure_ad_token.is_some()
    }

    /// Headers carrying the configured credentials.
    ///
    /// OpenAI keys go out as a bearer token, Azure keys as `api-key`, and an
    /// Azure AD token takes over the `Authorization` header when present.
    pub fn authorization_headers(&self) -> Header {
        let mut headers = Header::new();
        if let Some(key) = &self.api_key {
            headers.insert("Authorization", format!("Bearer {}", key.expose_secret()));
        }
        if let Some(org) = &self.organization {
            headers.insert("OpenAI-Organization", org.clone());
        }
        if let Some(key) = &self.azure_key {
            headers.insert("api-key", key.expose_secret());
        }
        if let Some(token) = &self.azure_ad_token {
            headers.insert("Authorization", format!("Bearer {}", token.expose_secret()));
        }
        headers
    }

    pub fn proxies(&self) -> &Proxies {
        &self.proxies
    }

    pub fn proxy_auth(&self) -> &ProxyAuth {
        &self.proxy_auth
    }

    pub fn max_timeout(&self) -> Option<Timeout> {
        self.max_timeout
    }

    /// Drop every credential; the secret buffers are zeroed as they go.
    pub fn clear(&mut self) {
        self.api_key = None;
        self.azure_key = None;
        self.azure_ad_token = None;
        self.organization = None;
        self.proxy_auth = ProxyAuth::default();
    }
}
