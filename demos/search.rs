//! Generate one page from the command line.
//!
//! ```text
//! OLLAMA_MODEL=qwen3-think:8b cargo run --example search -- how do tides work
//! ```
//!
//! Set `THEME=dark` or `IMAGES=true` to change the prompt. Ctrl-C cancels the
//! request and closes the connection.

use ollama_page_gen::{PageGenConfig, PageGenError, PageGenerator};
use std::env;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let query = env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        anyhow::bail!("usage: search <query>");
    }

    let config = PageGenConfig::from_env()?;
    tracing::info!(endpoint = config.default_endpoint(), models = ?config.models(), "config loaded");

    let generator = PageGenerator::new(config);
    let request = generator
        .request(query)
        .with_dark_mode(env::var("THEME").as_deref() == Ok("dark"))
        .with_images(env::var("IMAGES").as_deref() == Ok("true"));

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    match generator.generate(&request, &cancel).await {
        Ok(result) => {
            println!("{}", result.html);
            if !result.think_text.is_empty() {
                eprintln!("--- thinking ---\n{}", result.think_text);
            }
            eprintln!(
                "--- tokens: prompt={:?} response={:?} ---",
                result.prompt_tokens, result.response_tokens
            );
            eprintln!("--- debug ---\n{}", result.debug_log);
            if let Some(note) = result.failure_note {
                eprintln!("generation degraded: {}", note);
            }
        }
        Err(PageGenError::Cancelled) => eprintln!("cancelled"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
