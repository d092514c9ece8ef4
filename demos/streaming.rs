//! Streaming chat completion consumed as Server-Sent Events.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY="your-api-key"
//! cargo run --example streaming
//! ```

use futures::StreamExt;
use oaiclient::options::Body;
use oaiclient::sse::SseStreamExt;
use oaiclient::{Authorization, Client, Request};
use serde_json::{json, Value};
use std::io::Write;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let client = Client::new(Authorization::from_env()?);

    let body = json!({
        "model": "gpt-4o-mini",
        "stream": true,
        "messages": [{"role": "user", "content": "Write a haiku about borrow checkers."}],
    });

    let stream = client
        .stream(Request::post("https://api.openai.com/v1", "/chat/completions").option(Body::from(body)))
        .await?;

    println!("Streaming response:\n");
    let events = stream.sse();
    futures::pin_mut!(events);
    while let Some(data) = events.next().await {
        let event: Value = serde_json::from_str(&data?)?;
        if let Some(delta) = event["choices"][0]["delta"]["content"].as_str() {
            print!("{}", delta);
            std::io::stdout().flush()?;
        }
    }
    println!();

    Ok(())
}
