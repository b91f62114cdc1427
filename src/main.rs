//! Interactive demo: every line read from stdin is submitted as a search term.
//!
//! Type fast enough and intermediate lines are never looked up. Set `RUST_LOG`
//! (for example `RUST_LOG=rxsearch=debug`) to watch terms settle.

use std::{error::Error, time::Duration};

use rxsearch::search::{extract_field, SearchConfig, SearchPipeline};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

// How long to wait for the last lookup once stdin is closed.
const LINGER: Duration = Duration::from_secs(5);
const SHOWN_TITLES: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = SearchConfig::default().with_request_timeout(Duration::from_secs(10));
    let linger = config.debounce + LINGER;
    let mut pipeline = SearchPipeline::http(config)?;

    pipeline.subscribe_fn(|outcome| match outcome {
        Ok(result) => {
            let children = result
                .payload
                .as_ref()
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            println!("{}: {} results", result.term, children.len());
            for child in children.iter().take(SHOWN_TITLES) {
                if let Some(title) = extract_field(child, &["data", "title"]).and_then(Value::as_str) {
                    println!("  {title}");
                }
            }
        }
        Err(err) => eprintln!("{err}"),
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let term = line.trim();
        if !term.is_empty() {
            pipeline.submit(term);
        }
    }

    info!("input closed, waiting for the last lookup");
    tokio::time::sleep(linger).await;
    pipeline.teardown();
    Ok(())
}
