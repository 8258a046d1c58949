use crate::debug_log::DebugLog;
use crate::types::{StreamChunk, TokenUsage, Transcript};
use futures::{Stream, StreamExt};
use std::fmt::Display;
use tokio_util::sync::CancellationToken;

/// How a response stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The byte stream ended normally.
    Completed,
    /// The byte stream yielded an error. Text read before it is kept.
    ReadFailed(String),
    /// The cancellation token fired. Text read before it is kept.
    Cancelled,
}

/// Result of [`decode_stream`].
#[derive(Debug, Clone)]
pub struct Decoded {
    pub transcript: Transcript,
    pub outcome: StreamOutcome,
}

/// Longest record kept in memory while waiting for its newline.
const MAX_RECORD_BYTES: usize = 8 * 1024 * 1024;

/// Decode an Ollama NDJSON response stream into a [`Transcript`].
///
/// Records are split on `\n` after buffering, so a record spanning several
/// network chunks is reassembled before decoding. A record that fails to
/// decode adds one warning to `log` and is skipped, as does a record that
/// grows past 8 MiB without a newline. Cancellation is checked before every
/// record and while waiting for more bytes. The stream is dropped before
/// this returns, on every path.
pub async fn decode_stream<S, B, E>(
    cancel: &CancellationToken,
    stream: S,
    log: &mut DebugLog,
) -> Decoded
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    decode_with_limit(cancel, stream, log, MAX_RECORD_BYTES).await
}

async fn decode_with_limit<S, B, E>(
    cancel: &CancellationToken,
    stream: S,
    log: &mut DebugLog,
    max_record: usize,
) -> Decoded
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut transcript = Transcript::default();
    let mut buffer: Vec<u8> = Vec::new();
    // Bytes of `buffer` already known to hold no newline.
    let mut scanned = 0usize;
    // Set while skipping the rest of a record that outgrew `max_record`.
    let mut oversized = false;
    let mut records = 0usize;

    let outcome = 'read: loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            item = stream.next() => Some(item),
        };
        let Some(item) = next else {
            break StreamOutcome::Cancelled;
        };

        match item {
            Some(Ok(chunk)) => {
                let mut bytes: &[u8] = chunk.as_ref();
                if oversized {
                    match bytes.iter().position(|b| *b == b'\n') {
                        Some(pos) => {
                            oversized = false;
                            bytes = &bytes[pos + 1..];
                        }
                        None => continue,
                    }
                }

                buffer.extend_from_slice(bytes);
                while let Some(offset) = buffer[scanned..].iter().position(|b| *b == b'\n') {
                    if cancel.is_cancelled() {
                        break 'read StreamOutcome::Cancelled;
                    }
                    let pos = scanned + offset;
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    scanned = 0;
                    records += 1;
                    decode_record(&line[..pos], records, &mut transcript, log);
                }
                scanned = buffer.len();

                if buffer.len() > max_record {
                    records += 1;
                    log.warn(format!(
                        "Discarding stream record {} longer than {} bytes",
                        records, max_record
                    ));
                    buffer.clear();
                    scanned = 0;
                    oversized = true;
                }
            }
            Some(Err(e)) => {
                log.warn(format!("Error reading response stream: {}", e));
                break StreamOutcome::ReadFailed(e.to_string());
            }
            None => {
                if !buffer.is_empty() {
                    if cancel.is_cancelled() {
                        break StreamOutcome::Cancelled;
                    }
                    records += 1;
                    decode_record(&buffer, records, &mut transcript, log);
                }
                break StreamOutcome::Completed;
            }
        }
    };

    if outcome == StreamOutcome::Cancelled {
        log.info(format!(
            "Generation cancelled after {} records ({} bytes of text kept)",
            records,
            transcript.text.len()
        ));
    } else {
        record_usage(&mut transcript, log);
        log.info(format!(
            "Received {} records, {} bytes of text",
            records,
            transcript.text.len()
        ));
    }

    Decoded { transcript, outcome }
}

fn decode_record(line: &[u8], index: usize, transcript: &mut Transcript, log: &mut DebugLog) {
    if line.iter().all(u8::is_ascii_whitespace) {
        return;
    }

    match serde_json::from_slice::<StreamChunk>(line) {
        Ok(chunk) => {
            transcript.text.push_str(&chunk.response);
            transcript.saw_final |= chunk.done;
            transcript.last_chunk = Some(chunk);
        }
        Err(e) => {
            log.warn(format!("Skipping malformed stream record {}: {}", index, e));
        }
    }
}

/// Take token counts from the last decoded chunk, if and only if it is final.
fn record_usage(transcript: &mut Transcript, log: &mut DebugLog) {
    let Some(last) = transcript.last_chunk.as_ref().filter(|c| c.done) else {
        log.warn("Stream ended without a final chunk; token usage unavailable");
        return;
    };

    match (last.prompt_eval_count, last.eval_count) {
        (Some(prompt_tokens), Some(response_tokens)) => {
            transcript.usage = Some(TokenUsage {
                prompt_tokens,
                response_tokens,
            });
        }
        _ => log.warn("Final chunk carried no token counts; token usage unavailable"),
    }
}
