//! Incremental UTF-8 decoding of a response body.

use std::pin::Pin;

use chatify_core::error::ProviderError;
use chatify_core::inference::ByteStream;

/// Decoded text fragments of one response, in arrival order.
pub type TextStream = Pin<Box<dyn futures_core::Stream<Item = Result<String, ProviderError>> + Send>>;

/// Stateful UTF-8 decoder for a body delivered in arbitrary byte chunks.
///
/// A multi-byte sequence cut by a chunk boundary is held back until the rest
/// of it arrives. Bytes that can never form a valid sequence are replaced
/// with U+FFFD, the same way [`String::from_utf8_lossy`] does.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes everything that is decodable so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        let mut pos = 0;
        loop {
            match std::str::from_utf8(&self.pending[pos..]) {
                Ok(rest) => {
                    out.push_str(rest);
                    pos = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = pos + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[pos..valid_end]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            pos = valid_end + len;
                        }
                        // Truncated sequence at the end: wait for more bytes
                        None => {
                            pos = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..pos);
        out
    }

    /// Number of bytes held back waiting for the rest of a sequence.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flushes whatever is still held back, lossily.
    pub fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Turns a byte stream into a stream of text fragments.
///
/// The result is lazy and single-use. It ends when the source ends, after a
/// final flush of held-back bytes, or right after yielding the first error.
pub fn decode_stream(source: ByteStream) -> TextStream {
    let stream = async_stream::stream! {
        use tokio_stream::StreamExt;

        let mut source = source;
        let mut decoder = Utf8Decoder::new();
        let mut failed = false;

        while let Some(chunk) = source.next().await {
            match chunk {
                Ok(bytes) => {
                    let text = decoder.decode(&bytes);
                    if !text.is_empty() {
                        yield Ok(text);
                    }
                }
                Err(e) => {
                    failed = true;
                    yield Err(e);
                    break;
                }
            }
        }

        if !failed {
            if decoder.pending_len() > 0 {
                tracing::debug!(bytes = decoder.pending_len(), "flushing incomplete trailing sequence");
            }
            let tail = decoder.finish();
            if !tail.is_empty() {
                yield Ok(tail);
            }
        }
    };

    Box::pin(stream)
}
