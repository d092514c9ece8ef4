//! Simple chat completion sent through the request façade.
//!
//! Endpoint wrappers describe each call with one struct whose optional
//! fields are only serialized when set, then hand it to the façade.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY="your-api-key"
//! cargo run --example simple_request
//! ```

use oaiclient::options::Body;
use oaiclient::{Authorization, Client, Request};
use serde::Serialize;

const API_ROOT: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Default, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let client = Client::new(Authorization::from_env()?);

    let request = ChatCompletionRequest {
        model: "gpt-4o-mini".to_string(),
        messages: vec![ChatMessage {
            role: "user",
            content: "What is the capital of France? Answer in one word.".to_string(),
        }],
        temperature: Some(0.7),
        max_tokens: Some(100),
        ..Default::default()
    };

    println!("Sending request to OpenAI...");

    match client
        .request(Request::post(API_ROOT, "/chat/completions").option(Body::json(&request)?))
        .await
    {
        Ok(response) => {
            println!("\n=== Response ({} in {:?}) ===", response.status_line(), response.elapsed());
            println!("{}", response["choices"][0]["message"]["content"]);
            println!("Usage: {}", response["usage"]);
        }
        Err(e) if e.is_rate_limited() => {
            eprintln!("Rate limited, try again later: {}", e);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
