//! Streaming decoder for the newline-delimited summary stream.
//!
//! The two-phase protocol delivers the entry list as one JSON-encoded
//! [`ManifestEntry`] per line. A producer task decodes lines as bytes arrive and
//! hands [`SynopsisEvent`]s to the collecting side over a bounded channel, so a
//! large manifest is never buffered whole before decoding starts.
//!
//! Empty lines are counted and skipped. A line that fails to decode is reported
//! as an [`SynopsisEvent::Error`] and reading continues, but the collector then
//! discards every entry it gathered and returns the last error instead. One bad
//! line therefore fails the whole synopsis even when every other line parsed.

use std::fmt::Display;

use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::manifest::ManifestEntry;

/// Capacity of the producer/collector channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Failure while reading or decoding the summary stream.
#[derive(Debug, Error)]
pub enum SynopsisError {
    /// A non-empty line was not a valid entry record.
    #[error("line {line} is not a valid entry record: {source}")]
    Decode {
        /// 1-indexed line number within the stream.
        line: usize,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The body stream itself failed.
    #[error("failed reading summary stream: {reason}")]
    Read {
        /// Description of the read failure.
        reason: String,
    },

    /// The producer stopped without signalling end of stream.
    #[error("summary stream decoder stopped before end of stream")]
    Interrupted,
}

/// One item emitted by the producer side of the decoder.
#[derive(Debug)]
pub enum SynopsisEvent {
    /// A decoded entry.
    Entry(ManifestEntry),
    /// A line or read failure; decoding continues after decode failures.
    Error(SynopsisError),
    /// No more events will follow.
    End,
}

/// Spawns the producer task that decodes `stream` line by line.
///
/// The returned receiver yields entries and errors in stream order, followed by
/// exactly one [`SynopsisEvent::End`].
pub fn spawn_decoder<S, B, E>(stream: S) -> mpsc::Receiver<SynopsisEvent>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut stream = std::pin::pin!(stream);
        let mut decoder = LineDecoder::default();
        let mut buffer: Vec<u8> = Vec::new();
        // Bytes of `buffer` already known to hold no newline.
        let mut scanned = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = tx
                        .send(SynopsisEvent::Error(SynopsisError::Read {
                            reason: e.to_string(),
                        }))
                        .await;
                    let _ = tx.send(SynopsisEvent::End).await;
                    return;
                }
            };
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(offset) = buffer[scanned..].iter().position(|b| *b == b'\n') {
                let pos = scanned + offset;
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                scanned = 0;
                if let Some(event) = decoder.decode(&line[..line.len() - 1])
                    && tx.send(event).await.is_err()
                {
                    return;
                }
            }
            scanned = buffer.len();
        }

        if !buffer.is_empty()
            && let Some(event) = decoder.decode(&buffer)
            && tx.send(event).await.is_err()
        {
            return;
        }

        debug!(
            lines = decoder.line,
            empty_lines = decoder.empty_lines,
            "summary stream fully read"
        );
        let _ = tx.send(SynopsisEvent::End).await;
    });

    rx
}

/// Collects decoder events into the final entry list.
///
/// # Errors
///
/// Returns the last error seen if any line failed to decode or the stream
/// could not be read; successfully decoded entries are discarded in that case.
pub async fn collect_synopsis(
    mut events: mpsc::Receiver<SynopsisEvent>,
) -> Result<Vec<ManifestEntry>, SynopsisError> {
    let mut entries = Vec::new();
    let mut last_error: Option<SynopsisError> = None;

    loop {
        match events.recv().await {
            Some(SynopsisEvent::Entry(entry)) => entries.push(entry),
            Some(SynopsisEvent::Error(e)) => {
                warn!(error = %e, "summary stream produced an error");
                last_error = Some(e);
            }
            Some(SynopsisEvent::End) => {
                info!(entries = entries.len(), "reached end of summary stream");
                return match last_error {
                    Some(e) => Err(e),
                    None => Ok(entries),
                };
            }
            None => return Err(last_error.unwrap_or(SynopsisError::Interrupted)),
        }
    }
}

/// Decodes a newline-delimited entry stream into a complete entry list.
///
/// # Errors
///
/// See [`collect_synopsis`].
pub async fn decode_synopsis_stream<S, B, E>(stream: S) -> Result<Vec<ManifestEntry>, SynopsisError>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    collect_synopsis(spawn_decoder(stream)).await
}

#[derive(Debug, Default)]
struct LineDecoder {
    line: usize,
    empty_lines: usize,
}

impl LineDecoder {
    fn decode(&mut self, raw: &[u8]) -> Option<SynopsisEvent> {
        self.line += 1;
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.is_empty() {
            self.empty_lines += 1;
            info!(line = self.line, "got zero-length record");
            return None;
        }

        Some(match serde_json::from_slice::<ManifestEntry>(raw) {
            Ok(entry) => {
                debug!(entry_id = %entry.entry_id, path = %entry.path, "decoded entry");
                SynopsisEvent::Entry(entry)
            }
            Err(source) => SynopsisEvent::Error(SynopsisError::Decode {
                line: self.line,
                source,
            }),
        })
    }
}
