//! Line-delimited JSON framing for process workers.
//!
//! A process worker talks to its parent over stdio: control messages on
//! stdin, worker messages on stdout, one JSON object per line.
//!
//! ```text
//! parent ──stdin──►  {"type":"start"}\n{"type":"pause"}\n ...  ──► child
//! parent ◄─stdout──  {"type":"ready"}\n{"type":"frame_ready",...}\n ◄── child
//! ```
//!
//! Lines longer than the reader's limit are skipped in full and reported as
//! [`EventError::LineTooLong`]; the stream stays usable afterwards.
//!
//! # Example
//!
//! ```
//! use mxos_event::codec::{write_message, LineReader};
//! use mxos_event::ControlMessage;
//!
//! let mut wire = Vec::new();
//! write_message(&mut wire, &ControlMessage::Start).unwrap();
//! write_message(&mut wire, &ControlMessage::Stop).unwrap();
//!
//! let mut reader = LineReader::new(wire.as_slice());
//! let first: ControlMessage = reader.read().unwrap().unwrap().unwrap();
//! assert_eq!(first, ControlMessage::Start);
//! ```

use crate::EventError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{self, BufRead, Read, Write};

/// Default maximum line size: 4 MiB, enough for a 256×128 frame in JSON.
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Serializes a message as one newline-terminated line.
///
/// # Errors
///
/// Returns [`EventError::Encode`] if serialization fails.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, EventError> {
    let mut line = serde_json::to_string(message).map_err(|e| EventError::Encode(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Parses one line (trailing newline optional).
///
/// # Errors
///
/// Returns [`EventError::Decode`] if the line is not a valid message.
pub fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Result<T, EventError> {
    let trimmed = line.strip_suffix(b"\n").unwrap_or(line);
    let trimmed = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);
    serde_json::from_slice(trimmed).map_err(|e| EventError::Decode(e.to_string()))
}

/// Writes one message and flushes, so the peer sees it immediately.
///
/// # Errors
///
/// Returns [`EventError::Encode`] or [`EventError::Io`].
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<(), EventError> {
    let line = encode_line(message)?;
    writer.write_all(line.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Reads messages from a byte stream, one per line.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    max: usize,
}

impl<R: BufRead> LineReader<R> {
    /// Creates a reader with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self::with_limit(inner, MAX_LINE_BYTES)
    }

    /// Creates a reader with a custom line limit.
    #[must_use]
    pub fn with_limit(inner: R, max: usize) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            max,
        }
    }

    /// Reads the next message.
    ///
    /// - `Ok(None)`: end of stream
    /// - `Ok(Some(Err(_)))`: a bad line was consumed; keep reading
    /// - `Err(_)`: the stream itself failed
    ///
    /// Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub fn read<T: DeserializeOwned>(&mut self) -> io::Result<Option<Result<T, EventError>>> {
        loop {
            self.buf.clear();
            let limit = self.max as u64 + 1;
            let n = (&mut self.inner).take(limit).read_until(b'\n', &mut self.buf)?;
            if n == 0 {
                return Ok(None);
            }

            if self.buf.last() != Some(&b'\n') && self.buf.len() > self.max {
                let len = self.buf.len() + self.skip_rest_of_line()?;
                return Ok(Some(Err(EventError::LineTooLong { len, max: self.max })));
            }

            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(decode_line(&self.buf)));
        }
    }

    fn skip_rest_of_line(&mut self) -> io::Result<usize> {
        let mut skipped = 0;
        loop {
            let available = self.inner.fill_buf()?;
            if available.is_empty() {
                return Ok(skipped);
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.inner.consume(pos + 1);
                    return Ok(skipped + pos + 1);
                }
                None => {
                    let len = available.len();
                    self.inner.consume(len);
                    skipped += len;
                }
            }
        }
    }
}
