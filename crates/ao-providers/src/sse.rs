//! Shared SSE streaming infrastructure for all provider adapters.
//!
//! Every provider follows the same pattern: receive a `reqwest::Response`,
//! buffer chunks, split on `\n\n`, extract `data:` payloads, and feed each
//! payload to a provider-specific parser that returns `Vec<Result<ProviderChunk>>`.

use ao_domain::error::Result;
use ao_domain::stream::{BoxStream, ProviderChunk};

use crate::util::from_reqwest;

/// Extract complete `data:` payloads from an SSE buffer.
///
/// SSE events are delimited by `\n\n`. Only `data:` lines are kept;
/// `event:`/`id:`/`retry:` lines are ignored. The buffer is drained
/// in-place, leaving any trailing partial event for the next call.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        for line in block.lines() {
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

/// Build a [`BoxStream`] from an SSE `reqwest::Response` and a
/// provider-specific parser closure.
///
/// The closure receives each `data:` payload string and returns zero
/// or more chunks. It is `FnMut` because some providers need mutable
/// state across calls.
pub(crate) fn sse_response_stream<F>(
    provider: String,
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<ProviderChunk>>
where
    F: FnMut(&str) -> Vec<Result<ProviderChunk>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut done_emitted = false;

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));

                    for data in drain_data_lines(&mut buffer) {
                        for chunk in parse_data(&data) {
                            if matches!(&chunk, Ok(ProviderChunk::Done { .. })) {
                                done_emitted = true;
                            }
                            yield chunk;
                        }
                    }
                }
                Ok(None) => {
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for data in drain_data_lines(&mut buffer) {
                            for chunk in parse_data(&data) {
                                if matches!(&chunk, Ok(ProviderChunk::Done { .. })) {
                                    done_emitted = true;
                                }
                                yield chunk;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(&provider, e));
                    break;
                }
            }
        }

        if !done_emitted {
            yield Ok(ProviderChunk::Done { finish_reason: Some("stop".into()), usage: None });
        }
    };

    Box::pin(stream)
}
