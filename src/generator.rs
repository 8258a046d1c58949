use crate::{
    config::PageGenConfig,
    debug_log::DebugLog,
    error::Result,
    fence::strip_fences,
    links::rewrite_links,
    prompt::build_prompt,
    stream::{decode_stream, StreamOutcome},
    think::{extract_think, is_thinking_model},
    types::{GenerationRequest, GenerationResult},
    PageGenError,
};
use futures::StreamExt;
use reqwest::{header::CONTENT_TYPE, Client, Response};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Bytes of a non-success response body kept for the debug log.
const MAX_ERROR_BODY_BYTES: usize = 4096;

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Generates and post-processes one web page per query.
///
/// Holds only read-only configuration and a pooled HTTP client, so a single
/// generator can be cloned into every request handler.
///
/// # Example
/// ```no_run
/// use ollama_page_gen::{PageGenConfig, PageGenerator};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> ollama_page_gen::Result<()> {
/// let generator = PageGenerator::new(PageGenConfig::default());
/// let request = generator.request("how do tides work").with_dark_mode(true);
/// let result = generator.generate(&request, &CancellationToken::new()).await?;
/// println!("{}", result.html);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PageGenerator {
    http: Client,
    config: PageGenConfig,
}

impl PageGenerator {
    pub fn new(config: PageGenConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn config(&self) -> &PageGenConfig {
        &self.config
    }

    /// Start a request for `query` with this generator's defaults.
    pub fn request(&self, query: impl Into<String>) -> GenerationRequest {
        GenerationRequest::new(query, &self.config)
    }

    /// Generate the page for `request`.
    ///
    /// Backend failures never surface as errors: they produce a placeholder
    /// result whose `failure_note` is set and whose `debug_log` carries the
    /// detail. The only error returned is [`PageGenError::Cancelled`], when
    /// `cancel` fires before the page is complete.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult> {
        let mut log = DebugLog::new();
        log.info(format!("Query: {}", request.query()));
        log.info(format!("Model: {}", request.model()));
        log.info(format!("URL: {}", request.endpoint()));
        log.info(format!("Theme: {}", request.theme()));
        tracing::info!(
            model = request.model(),
            endpoint = request.endpoint(),
            "generating page"
        );

        let prompt = build_prompt(request);

        let response = match self.send(request, &prompt, cancel, &mut log).await {
            Ok(resp) => resp,
            Err(PageGenError::Cancelled) => {
                log.info("Generation cancelled before the response stream started");
                return Err(PageGenError::Cancelled);
            }
            Err(e) => return Ok(placeholder(request, e, log)),
        };

        let decoded = decode_stream(cancel, response.bytes_stream(), &mut log).await;
        let failure_note = match decoded.outcome {
            StreamOutcome::Cancelled => return Err(PageGenError::Cancelled),
            StreamOutcome::ReadFailed(message) => {
                Some(PageGenError::StreamRead(message).to_string())
            }
            StreamOutcome::Completed => None,
        };

        let html = rewrite_links(&strip_fences(&decoded.transcript.text));

        let (html, think_text) = if request.thinking() || is_thinking_model(request.model()) {
            let extraction = extract_think(&html);
            (extraction.cleaned, extraction.think_text)
        } else {
            (html, String::new())
        };

        let usage = decoded.transcript.usage;
        tracing::info!(
            usage = ?usage,
            html_bytes = html.len(),
            "page generated"
        );

        Ok(GenerationResult {
            html,
            think_text,
            prompt_tokens: usage.map(|u| u.prompt_tokens),
            response_tokens: usage.map(|u| u.response_tokens),
            debug_log: log.to_string(),
            failure_note,
        })
    }

    /// Send the streaming `/api/generate` call and check its status.
    async fn send(
        &self,
        request: &GenerationRequest,
        prompt: &str,
        cancel: &CancellationToken,
        log: &mut DebugLog,
    ) -> Result<Response> {
        let body = serde_json::to_vec(&GenerateBody {
            model: request.model(),
            prompt,
            stream: true,
        })?;

        let url = format!("{}/api/generate", request.endpoint().trim_end_matches('/'));
        let http_request = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .build()
            .map_err(|e| PageGenError::InvalidRequest(format!("{}: {}", url, e)))?;

        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PageGenError::Cancelled),
            resp = self.http.execute(http_request) => resp.map_err(|e| PageGenError::Connection {
                endpoint: request.endpoint().to_string(),
                message: e.to_string(),
            })?,
        };

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = read_error_body(resp, cancel, log).await?;
            return Err(PageGenError::Http { status, body });
        }

        Ok(resp)
    }
}

/// Read at most [`MAX_ERROR_BODY_BYTES`] of an error response body.
///
/// The read races `cancel`. A body that fails mid-read is noted in `log` and
/// whatever arrived before the failure is returned.
async fn read_error_body(
    resp: Response,
    cancel: &CancellationToken,
    log: &mut DebugLog,
) -> Result<String> {
    let mut stream = std::pin::pin!(resp.bytes_stream());
    let mut body: Vec<u8> = Vec::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PageGenError::Cancelled),
            next = stream.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                let room = MAX_ERROR_BODY_BYTES - body.len();
                body.extend_from_slice(&bytes[..bytes.len().min(room)]);
                if body.len() >= MAX_ERROR_BODY_BYTES {
                    log.info(format!(
                        "Error body truncated to {} bytes",
                        MAX_ERROR_BODY_BYTES
                    ));
                    break;
                }
            }
            Some(Err(e)) => {
                log.warn(format!("Error body unreadable: {}", e));
                break;
            }
            None => break,
        }
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Turn a pre-stream failure into a renderable placeholder result.
fn placeholder(request: &GenerationRequest, error: PageGenError, mut log: DebugLog) -> GenerationResult {
    let html = match &error {
        PageGenError::Connection { .. } => format!(
            "<p>Error connecting to LLM service at {}. Is Ollama running?</p>",
            escape_html(request.endpoint())
        ),
        PageGenError::Http { status, .. } => {
            log.warn(format!("Non-200 status: {}", status));
            format!("<p>LLM returned error code {}.</p>", status)
        }
        _ => "<p>Error generating content.</p>".to_string(),
    };
    log.warn(error.to_string());
    GenerationResult::placeholder(html, error.to_string(), log.to_string())
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
