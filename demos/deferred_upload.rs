//! Upload a fine-tuning file in the background while listing models.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY="your-api-key"
//! cargo run --example deferred_upload -- path/to/train.jsonl
//! ```

use oaiclient::options::{Multipart, Parameters, Part};
use oaiclient::{Authorization, Client, Request};

const API_ROOT: &str = "https://api.openai.com/v1";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: deferred_upload <training-file.jsonl>")?;

    let client = Client::new(Authorization::from_env()?);

    let upload = client.request_deferred(
        Request::post(API_ROOT, "/files")
            .content_type("multipart/form-data")
            .option(
                Multipart::new()
                    .part(Part::value("purpose", "fine-tune"))
                    .part(Part::file("file", path)),
            ),
    );

    let files = client
        .request(Request::get(API_ROOT, "/files").option(Parameters::new().with("purpose", "fine-tune")))
        .await?;
    println!("Existing fine-tune files: {}", files["data"]);

    let uploaded = upload.wait().await?;
    println!("Uploaded {} ({} bytes)", uploaded["id"], uploaded["bytes"]);

    Ok(())
}
