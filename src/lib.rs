//! # oaiclient - request core for OpenAI-style REST APIs
//!
//! A small session/request layer that endpoint wrappers call through. It
//! turns independent option descriptors into one HTTP exchange and hands
//! back a classified response.
//!
//! ## Features
//! - Async-first, tokio compatible, with blocking and deferred call modes
//! - Composable option descriptors (URL, headers, body, multipart, query
//!   parameters, timeout, proxies, streaming callback)
//! - Pluggable transport; `reqwest` by default
//! - Opportunistic JSON parsing with a fixed error taxonomy
//! - Streaming via write callbacks or a consumer-driven byte stream
//!
//! ## Architecture
//!
//! - **`options`**: option descriptors
//! - **`session`**: one configured, single-use execution unit
//! - **`transport`** / **`http`**: the transport seam and its `reqwest` implementation
//! - **`response`**: raw results, responses and classification
//! - **`client`**: the request façade every endpoint goes through
//!
//! ## Example
//! ```no_run
//! use oaiclient::auth::Authorization;
//! use oaiclient::client::{Client, Request};
//! use oaiclient::options::{Body, Parameters};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(Authorization::new().with_key("your-api-key"));
//!
//!     let models = client
//!         .request(
//!             Request::get("https://api.openai.com/v1", "/models")
//!                 .option(Parameters::new().with("limit", "5")),
//!         )
//!         .await?;
//!     println!("{}", models["data"]);
//!
//!     let completion = client
//!         .request(
//!             Request::post("https://api.openai.com/v1", "/chat/completions").option(Body::from(
//!                 r#"{"model":"gpt-4o","messages":[{"role":"user","content":"Hello!"}]}"#,
//!             )),
//!         )
//!         .await?;
//!     println!("{}", completion["choices"][0]["message"]["content"]);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod options;
pub mod response;
pub mod session;
pub mod sse;
pub mod stream;
pub mod transport;

// Re-exports for convenience
pub use auth::Authorization;
pub use client::{Client, Deferred, Request};
pub use error::{ClientError, Result};
pub use response::{RawResult, Response};
pub use session::Session;
pub use stream::ResponseStream;
pub use transport::{Method, Transport};
