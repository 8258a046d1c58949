//! # Ollama Page Gen
//!
//! Turns a search query into a complete web page generated by an Ollama
//! model, then repairs the markup for display.
//!
//! The response from `/api/generate` is consumed as a stream of NDJSON
//! records and post-processed in a fixed order:
//!
//! 1. **Decode**: records are accumulated in arrival order; malformed
//!    records are skipped with a warning; token usage is read from the final
//!    record
//! 2. **Strip fences**: a leading/trailing ```` ```html ```` line is removed
//! 3. **Rewrite links**: every anchor points at `#` and carries its text in
//!    `data-topic`, so the front-end can run it as a new query
//! 4. **Extract thinking**: `<think>...</think>` blocks are moved out of the
//!    page for thinking models (or when explicitly requested)
//!
//! ## Features
//!
//! - **Always renderable**: connection failures and HTTP errors become a
//!   placeholder page plus a debug log, never an error
//! - **Cancellation**: a `CancellationToken` aborts the request and closes
//!   the connection, reported as [`PageGenError::Cancelled`]
//! - **Partial results**: a stream that breaks mid-body keeps the text
//!   received so far
//!
//! ## Quick Start
//!
//! ```no_run
//! use ollama_page_gen::{PageGenConfig, PageGenerator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = PageGenerator::new(PageGenConfig::from_env()?);
//!     let request = generator.request("How do rainbows form?").with_images(true);
//!
//!     let result = generator.generate(&request, &CancellationToken::new()).await?;
//!     println!("{}", result.html);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod debug_log;
pub mod error;
pub mod fence;
pub mod generator;
pub mod links;
pub mod prompt;
pub mod stream;
pub mod think;
pub mod types;

pub use config::{PageGenConfig, PageGenConfigBuilder};
pub use debug_log::DebugLog;
pub use error::{PageGenError, Result};
pub use fence::strip_fences;
pub use generator::PageGenerator;
pub use links::rewrite_links;
pub use stream::{decode_stream, Decoded, StreamOutcome};
pub use think::{extract_think, is_thinking_model, ThinkExtraction};
pub use types::{GenerationRequest, GenerationResult, StreamChunk, TokenUsage, Transcript};
