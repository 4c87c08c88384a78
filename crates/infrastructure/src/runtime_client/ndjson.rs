//! Newline-delimited JSON decoding for streamed responses
//!
//! Chunks from the network split lines arbitrarily. A partial trailing line
//! is held until the next chunk or the end of the stream; malformed lines are
//! logged and skipped.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use bytes::{Buf, Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::{trace, warn};

use application::ApplicationError;

/// Splits a byte stream into complete lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and drain every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos);
            self.buffer.advance(1);
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Drain the held partial line at end of stream
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = self.buffer.split();
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Parse one line, skipping blanks and malformed JSON
pub fn parse_line<T: DeserializeOwned>(line: &str) -> Option<T> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    trace!(line = %line, "Parsing stream line");
    match serde_json::from_str(line) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(line = %line, error = %e, "Skipping malformed stream line");
            None
        },
    }
}

struct DecodeState<S, T> {
    inner: Pin<Box<S>>,
    decoder: LineDecoder,
    ready: VecDeque<T>,
    finished: bool,
}

impl<S, T: DeserializeOwned> DecodeState<S, T> {
    fn absorb(&mut self, lines: impl IntoIterator<Item = String>) {
        self.ready
            .extend(lines.into_iter().filter_map(|line| parse_line(&line)));
    }
}

/// Decode a byte stream into a stream of JSON values, one per line
///
/// A transport error ends the stream after being yielded.
pub fn decode_stream<S, E, T>(
    bytes: S,
) -> impl Stream<Item = Result<T, ApplicationError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
    T: DeserializeOwned + Send + 'static,
{
    let state = DecodeState {
        inner: Box::pin(bytes),
        decoder: LineDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(value) = state.ready.pop_front() {
                return Some((Ok(value), state));
            }
            if state.finished {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    let lines = state.decoder.push(&chunk);
                    state.absorb(lines);
                },
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((
                        Err(ApplicationError::ExternalService(format!(
                            "stream interrupted: {e}"
                        ))),
                        state,
                    ));
                },
                None => {
                    state.finished = true;
                    let rest = state.decoder.finish();
                    state.absorb(rest);
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::PullProgressLine;

    #[test]
    fn holds_partial_line_until_completed() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"{\"status\":\"pull").is_empty());
        let lines = decoder.push(b"ing manifest\"}\n{\"status\"");
        assert_eq!(lines, vec![r#"{"status":"pulling manifest"}"#.to_string()]);
        assert_eq!(decoder.finish().as_deref(), Some(r#"{"status""#));
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        assert!(parse_line::<PullProgressLine>("not json").is_none());
        assert!(parse_line::<PullProgressLine>("   ").is_none());
        let line: PullProgressLine = parse_line(r#"{"status":"success"}"#).unwrap();
        assert!(line.is_success());
    }

    #[tokio::test]
    async fn decodes_lines_split_across_chunks() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"status\":\"pulling manifest\"}\n{\"status\":\"pull")),
            Ok(Bytes::from_static(b"ing abc\",\"total\":10,\"completed\":5}\ngarbage\n")),
            Ok(Bytes::from_static(b"{\"status\":\"success\"}")),
        ];

        let lines: Vec<PullProgressLine> = decode_stream(stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].completed, Some(5));
        assert!(lines[2].is_success());
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"status\":\"pulling manifest\"}\n")),
            Err(std::io::Error::other("reset")),
            Ok(Bytes::from_static(b"{\"status\":\"success\"}\n")),
        ];

        let items: Vec<Result<PullProgressLine, _>> =
            decode_stream(stream::iter(chunks)).collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn chunk_boundaries_do_not_change_lines(
                lines in prop::collection::vec("[a-z0-9 :{}\"]{0,24}", 0..8),
                cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
            ) {
                let text: String = lines.iter().map(|l| format!("{l}\n")).collect();
                let bytes = text.as_bytes();

                let mut points: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len() + 1)).collect();
                points.push(0);
                points.push(bytes.len());
                points.sort_unstable();
                points.dedup();

                let mut decoder = LineDecoder::new();
                let mut seen = Vec::new();
                for window in points.windows(2) {
                    seen.extend(decoder.push(&bytes[window[0]..window[1]]));
                }

                prop_assert_eq!(seen, lines);
                prop_assert!(decoder.finish().is_none());
            }
        }
    }
}
