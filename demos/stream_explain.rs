//! Streaming explanation example.
//!
//! Run with:
//! ```bash
//! export HACKITECH_TOKEN="your-session-token"
//! cargo run --example stream_explain
//! ```

use std::sync::Arc;
use std::time::Duration;

use hackitech_assistant::auth::BearerToken;
use hackitech_assistant::consumer::StreamingResponseConsumer;
use hackitech_assistant::model::StreamRequest;
use hackitech_assistant::options::StreamOptions;
use hackitech_assistant::session::SessionStatus;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Get the session token from the environment
    let token = std::env::var("HACKITECH_TOKEN")
        .expect("HACKITECH_TOKEN environment variable must be set");

    let options = StreamOptions::default()
        .with_timeout(Duration::from_secs(120))
        .with_idle_timeout(Duration::from_secs(30));

    let consumer = StreamingResponseConsumer::new(options, Arc::new(BearerToken::new(token)))?;

    let session = consumer.start(
        StreamRequest::new("Explain how SQL injection works in a login form")
            .with_request_id("demo-1"),
    );

    println!("Streaming explanation...\n");

    // Poll the session like a UI would: print whatever arrived since the
    // last look until the session settles.
    let mut printed = 0;
    loop {
        let text = session.text();
        if text.len() > printed {
            print!("{}", &text[printed..]);
            use std::io::Write;
            std::io::stdout().flush()?;
            printed = text.len();
        }

        if session.status().is_terminal() || session.status() == SessionStatus::Idle {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    println!("\n\n=== Stream Complete ===");
    println!("Status: {:?}", session.status());
    if let Some(error) = session.error() {
        eprintln!("Error: {error}");
    }

    Ok(())
}
