use ollama_page_gen::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// --- Mock Ollama backend ---

/// How the mock backend answers the single request it accepts.
enum Reply {
    /// Full response with the given status line and body.
    Complete { status: &'static str, body: String },
    /// Content-Length larger than `body`, then the socket closes.
    Truncated { status: &'static str, body: String },
    /// `body` is sent, then the connection stays open without more data.
    Stall { status: &'static str, body: String },
    /// The request is read but no response head is ever sent.
    Silent,
}

fn record(response: &str) -> String {
    json!({
        "model": "test-model",
        "created_at": "2024-05-01T12:00:00Z",
        "response": response,
        "done": false,
    })
    .to_string()
        + "\n"
}

fn final_record(prompt_tokens: u64, response_tokens: u64) -> String {
    json!({
        "model": "test-model",
        "created_at": "2024-05-01T12:00:01Z",
        "response": "",
        "done": true,
        "done_reason": "stop",
        "prompt_eval_count": prompt_tokens,
        "eval_count": response_tokens,
    })
    .to_string()
        + "\n"
}

fn ndjson(fragments: &[&str], with_final: bool) -> String {
    let mut body: String = fragments.iter().map(|f| record(f)).collect();
    if with_final {
        body.push_str(&final_record(42, 17));
    }
    body
}

/// Read one HTTP request and return its body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length: usize = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .map(|v| v.trim().parse().unwrap())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending body");
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8(buf[header_end..header_end + content_length].to_vec()).unwrap()
}

/// Start a backend that serves one request. The handle yields the request body.
async fn spawn_backend(reply: Reply) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request_body = read_request(&mut socket).await;

        let (status, body, declared_len) = match &reply {
            Reply::Complete { status, body } => (*status, body.as_str(), body.len()),
            Reply::Truncated { status, body } | Reply::Stall { status, body } => {
                (*status, body.as_str(), body.len() + 1024)
            }
            Reply::Silent => {
                hold_open(&mut socket).await;
                return request_body;
            }
        };
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/x-ndjson\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status, declared_len
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(body.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        if let Reply::Stall { .. } = reply {
            hold_open(&mut socket).await;
        }
        request_body
    });

    (format!("http://{}", addr), handle)
}

/// Keep the connection open until the client goes away.
async fn hold_open(socket: &mut TcpStream) {
    let mut sink = [0u8; 64];
    let _ = tokio::time::timeout(Duration::from_secs(10), socket.read(&mut sink)).await;
}

/// Run `generate` with a token that fires after 200ms.
async fn generate_cancelled_after_delay(endpoint: &str) -> Result<GenerationResult> {
    let generator = generator_for(endpoint);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    tokio::time::timeout(
        Duration::from_secs(5),
        generator.generate(&generator.request("q"), &cancel),
    )
    .await
    .expect("cancellation did not stop generation")
}

fn generator_for(endpoint: &str) -> PageGenerator {
    let config = PageGenConfig::builder()
        .with_endpoint(endpoint)
        .build()
        .unwrap();
    // Local mock backends must not be routed through an ambient proxy.
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    PageGenerator::new(config).with_http_client(http)
}

// --- End-to-end generation ---

#[tokio::test]
async fn test_generate_success_default_model() {
    let body = ndjson(
        &[
            "```html\n<h1>Cats</h1>\n",
            "<p>Cats are <think>kept</think> small.</p>\n",
            "<h2>Related Topics</h2><a href=\"https://en.wikipedia.org/wiki/Lion\">Lions</a>\n",
            "```",
        ],
        true,
    );
    let (endpoint, backend) = spawn_backend(Reply::Complete {
        status: "200 OK",
        body,
    })
    .await;

    let generator = generator_for(&endpoint);
    let request = generator.request("cats");
    let result = generator
        .generate(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.failure_note.is_none());
    assert_eq!(result.prompt_tokens, Some(42));
    assert_eq!(result.response_tokens, Some(17));
    assert!(!result.html.contains("```"));
    assert!(result.html.starts_with("<h1>Cats</h1>"));
    assert!(result
        .html
        .contains(r##"<a href="#" data-topic="Lions">Lions</a>"##));
    // Not a thinking model and no flag: think blocks stay in the page.
    assert!(result.html.contains("<think>kept</think>"));
    assert!(result.think_text.is_empty());
    assert!(result.debug_log.contains("Query: cats"));
    assert!(result.debug_log.contains("Model: llama3:8b"));

    let sent: Value = serde_json::from_str(&backend.await.unwrap()).unwrap();
    assert_eq!(sent["model"], "llama3:8b");
    assert_eq!(sent["stream"], true);
    assert!(sent["prompt"].as_str().unwrap().contains("\"cats\""));
}

#[tokio::test]
async fn test_generate_thinking_model_extracts_think_blocks() {
    let body = ndjson(
        &[
            "<think>\nThe user wants ",
            "a page about owls.\n</think>\n",
            "```html\n<h1>Owls</h1>\n```",
        ],
        true,
    );
    let (endpoint, _backend) = spawn_backend(Reply::Complete {
        status: "200 OK",
        body,
    })
    .await;

    let generator = generator_for(&endpoint);
    let request = generator.request("owls").with_model("qwen3-THINK:8b");
    let result = generator
        .generate(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.failure_note.is_none());
    assert!(!result.html.to_lowercase().contains("<think>"));
    assert!(!result.html.to_lowercase().contains("</think>"));
    assert!(result.html.contains("<h1>Owls</h1>"));
    assert_eq!(result.think_text, "The user wants a page about owls.");
}

#[tokio::test]
async fn test_generate_thinking_flag_forces_extraction() {
    let body = ndjson(&["<think>plan</think><h1>Tides</h1>"], true);
    let (endpoint, _backend) = spawn_backend(Reply::Complete {
        status: "200 OK",
        body,
    })
    .await;

    let generator = generator_for(&endpoint);
    let request = generator.request("tides").with_thinking(true);
    let result = generator
        .generate(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.html, "<h1>Tides</h1>");
    assert_eq!(result.think_text, "plan");
}

#[tokio::test]
async fn test_generate_prompt_carries_theme_and_images() {
    let (endpoint, backend) = spawn_backend(Reply::Complete {
        status: "200 OK",
        body: ndjson(&["<h1>x</h1>"], true),
    })
    .await;

    let generator = generator_for(&endpoint);
    let request = generator
        .request("auroras")
        .with_dark_mode(true)
        .with_images(true);
    let result = generator
        .generate(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.debug_log.contains("Theme: dark"));

    let sent: Value = serde_json::from_str(&backend.await.unwrap()).unwrap();
    let prompt = sent["prompt"].as_str().unwrap();
    assert!(prompt.contains("dark mode"));
    assert!(prompt.contains("inline <svg>"));
}

#[tokio::test]
async fn test_generate_without_final_chunk() {
    let (endpoint, _backend) = spawn_backend(Reply::Complete {
        status: "200 OK",
        body: ndjson(&["<h1>Half", " a page</h1>"], false),
    })
    .await;

    let generator = generator_for(&endpoint);
    let result = generator
        .generate(&generator.request("q"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.html, "<h1>Half a page</h1>");
    assert!(result.prompt_tokens.is_none());
    assert!(result.response_tokens.is_none());
    assert!(result.failure_note.is_none());
    assert!(result.debug_log.contains("token usage unavailable"));
}

#[tokio::test]
async fn test_generate_skips_malformed_records() {
    let body = format!(
        "{}{}{}{}",
        record("<p>one</p>"),
        "{\"response\": oops}\n",
        record("<p>two</p>"),
        final_record(1, 2)
    );
    let (endpoint, _backend) = spawn_backend(Reply::Complete {
        status: "200 OK",
        body,
    })
    .await;

    let generator = generator_for(&endpoint);
    let result = generator
        .generate(&generator.request("q"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.html, "<p>one</p><p>two</p>");
    assert_eq!(result.response_tokens, Some(2));
    assert_eq!(result.debug_log.matches("malformed stream record").count(), 1);
}

// --- Failure paths ---

#[tokio::test]
async fn test_generate_http_error_yields_placeholder() {
    let (endpoint, _backend) = spawn_backend(Reply::Complete {
        status: "404 Not Found",
        body: "{\"error\":\"model 'nope' not found\"}".to_string(),
    })
    .await;

    let generator = generator_for(&endpoint);
    let request = generator.request("q").with_model("nope");
    let result = generator
        .generate(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.html, "<p>LLM returned error code 404.</p>");
    assert!(result.failure_note.is_some());
    assert!(result.think_text.is_empty());
    assert!(result.prompt_tokens.is_none());
    assert!(result.debug_log.contains("Non-200 status: 404"));
}

#[tokio::test]
async fn test_generate_error_body_is_capped() {
    let (endpoint, _backend) = spawn_backend(Reply::Complete {
        status: "503 Service Unavailable",
        body: "x".repeat(10_000),
    })
    .await;

    let generator = generator_for(&endpoint);
    let result = generator
        .generate(&generator.request("q"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.html, "<p>LLM returned error code 503.</p>");
    assert!(result.debug_log.contains("Error body truncated to 4096 bytes"));
    assert!(!result.debug_log.contains(&"x".repeat(4097)));
}

#[tokio::test]
async fn test_generate_connection_refused_yields_placeholder() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let generator = generator_for(&endpoint);
    let result = generator
        .generate(&generator.request("q"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.html.contains(&endpoint));
    assert!(result
        .failure_note
        .as_deref()
        .unwrap()
        .starts_with("Cannot connect to Ollama"));
    assert!(result.debug_log.contains("Cannot connect to Ollama"));
}

#[tokio::test]
async fn test_generate_truncated_body_keeps_partial_text() {
    let (endpoint, _backend) = spawn_backend(Reply::Truncated {
        status: "200 OK",
        body: ndjson(&["<h1>Part", "ial</h1>"], false),
    })
    .await;

    let generator = generator_for(&endpoint);
    let result = generator
        .generate(&generator.request("q"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.html, "<h1>Partial</h1>");
    assert!(result
        .failure_note
        .as_deref()
        .unwrap()
        .starts_with("Error reading response stream"));
    assert!(result.prompt_tokens.is_none());
}

#[tokio::test]
async fn test_generate_cancelled_mid_stream() {
    let (endpoint, _backend) = spawn_backend(Reply::Stall {
        status: "200 OK",
        body: ndjson(&["<h1>Never", " finished"], false),
    })
    .await;

    let result = generate_cancelled_after_delay(&endpoint).await;
    assert!(matches!(result, Err(PageGenError::Cancelled)));
}

#[tokio::test]
async fn test_generate_cancelled_while_awaiting_response_head() {
    let (endpoint, backend) = spawn_backend(Reply::Silent).await;

    let result = generate_cancelled_after_delay(&endpoint).await;
    assert!(matches!(result, Err(PageGenError::Cancelled)));

    // The request did go out before the token fired.
    let sent: Value = serde_json::from_str(&backend.await.unwrap()).unwrap();
    assert_eq!(sent["stream"], true);
}

#[tokio::test]
async fn test_generate_cancelled_while_reading_error_body() {
    let (endpoint, _backend) = spawn_backend(Reply::Stall {
        status: "500 Internal Server Error",
        body: "partial".to_string(),
    })
    .await;

    let result = generate_cancelled_after_delay(&endpoint).await;
    assert!(matches!(result, Err(PageGenError::Cancelled)));
}

#[tokio::test]
async fn test_generate_unreadable_error_body_is_noted() {
    let (endpoint, _backend) = spawn_backend(Reply::Truncated {
        status: "500 Internal Server Error",
        body: "{\"error\":\"out of mem".to_string(),
    })
    .await;

    let generator = generator_for(&endpoint);
    let result = generator
        .generate(&generator.request("q"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.html, "<p>LLM returned error code 500.</p>");
    assert!(result.debug_log.contains("Error body unreadable"));
    // Bytes received before the failure are still reported.
    assert!(result.debug_log.contains("out of mem"));
}

// --- Routing parameters ---

#[test]
fn test_request_from_params() {
    let config = PageGenConfig::default();
    let params: HashMap<String, String> = [
        ("q", "volcanoes"),
        ("model", "mistral:7b"),
        ("theme", "dark"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let request = GenerationRequest::from_params(&params, &config).unwrap();
    assert_eq!(request.query(), "volcanoes");
    assert_eq!(request.model(), "mistral:7b");
    assert_eq!(request.endpoint(), config.default_endpoint());
    assert!(request.dark_mode());
    assert!(!request.thinking());

    assert!(GenerationRequest::from_params(&HashMap::new(), &config).is_none());
}

// --- Text transforms composed in pipeline order ---

#[test]
fn test_transforms_compose() {
    let raw = "```html\n<think>x</think><a href=\"/a\">Alpha</a>\n```";
    let html = rewrite_links(&strip_fences(raw));
    let out = extract_think(&html);
    assert_eq!(out.cleaned, r##"<a href="#" data-topic="Alpha">Alpha</a>"##);
    assert_eq!(out.think_text, "x");
}

#[test]
fn test_strip_fences_idempotent() {
    for input in ["```html\n<p>a</p>\n```", "```\n```\nx\n```", "a\n```\nb"] {
        let once = strip_fences(input);
        assert_eq!(strip_fences(&once), once);
    }
}

// --- Error type tests ---

#[test]
fn test_error_display() {
    let err = PageGenError::Http {
        status: 500,
        body: "boom".to_string(),
    };
    assert_eq!(err.to_string(), "Ollama returned HTTP 500: boom");

    let err = PageGenError::Cancelled;
    assert_eq!(err.to_string(), "Generation was cancelled");

    let err = PageGenError::Connection {
        endpoint: "http://localhost:11434".to_string(),
        message: "refused".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Cannot connect to Ollama at http://localhost:11434: refused"
    );

    let err = PageGenError::InvalidConfig("bad config".to_string());
    assert_eq!(err.to_string(), "Invalid configuration: bad config");
}
