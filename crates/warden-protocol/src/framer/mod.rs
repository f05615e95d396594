//! Newline framing for the inbound byte stream.
//!
//! Reads from the host arrive in arbitrary chunks: a chunk may hold several
//! records, part of one, or nothing but a newline. [`Framer`] buffers the
//! trailing fragment between calls and yields each complete record exactly
//! once, regardless of where the chunk boundaries fell.

use crate::error::FrameError;

const RECORD_TERMINATOR: u8 = b'\n';

/// Incremental splitter turning byte chunks into complete text records.
///
/// # Example
///
/// ```
/// use warden_protocol::Framer;
///
/// let mut framer = Framer::new(1024);
/// assert_eq!(framer.feed(b"{\"cmd\":\"a\"").count(), 0);
/// let records: Vec<_> = framer.feed(b"}\n\n{\"cmd\":\"b\"}\n").collect();
/// assert_eq!(records.len(), 2);
/// ```
#[derive(Debug)]
pub struct Framer {
    pending: Vec<u8>,
    max_record_bytes: usize,
    discarding: bool,
}

impl Framer {
    /// Creates a framer rejecting records larger than `max_record_bytes`.
    #[must_use]
    pub const fn new(max_record_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_record_bytes,
            discarding: false,
        }
    }

    /// Appends a chunk and returns the records it completes.
    ///
    /// The returned iterator is lazy: records are located as it is advanced.
    /// Bytes belonging to records the caller never pulled stay buffered and
    /// are yielded by the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Records<'_> {
        self.pending.extend_from_slice(chunk);
        Records {
            framer: self,
            cursor: 0,
        }
    }

    /// Signals end of input.
    ///
    /// Returns [`FrameError::Unterminated`] when a non-blank fragment was
    /// still waiting for its terminator. The fragment is discarded either way.
    pub fn finish(&mut self) -> Option<FrameError> {
        let fragment = std::mem::take(&mut self.pending);
        if std::mem::replace(&mut self.discarding, false) {
            return None;
        }
        if is_blank(&fragment) {
            return None;
        }
        Some(FrameError::Unterminated {
            size: fragment.len(),
        })
    }

    /// Number of buffered bytes not yet yielded as a record.
    #[must_use]
    pub const fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Records completed by one [`Framer::feed`] call.
#[derive(Debug)]
pub struct Records<'a> {
    framer: &'a mut Framer,
    cursor: usize,
}

impl Iterator for Records<'_> {
    type Item = Result<String, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = self.framer.pending.get(self.cursor..).unwrap_or_default();
            let Some(end) = rest.iter().position(|byte| *byte == RECORD_TERMINATOR) else {
                let fragment_len = rest.len();
                return self.hold_fragment(fragment_len);
            };
            let record = rest.get(..end).unwrap_or_default().to_vec();
            self.cursor += end + 1;

            if std::mem::replace(&mut self.framer.discarding, false) {
                // Tail of a record already reported as too large.
                continue;
            }
            if is_blank(&record) {
                continue;
            }
            if record.len() > self.framer.max_record_bytes {
                return Some(Err(FrameError::RecordTooLarge {
                    size: record.len(),
                    max_size: self.framer.max_record_bytes,
                }));
            }
            return Some(String::from_utf8(record).map_err(|error| FrameError::InvalidUtf8 {
                source: error.utf8_error(),
            }));
        }
    }
}

impl Records<'_> {
    /// Handles an unterminated fragment at the end of the buffer.
    fn hold_fragment(&mut self, size: usize) -> Option<Result<String, FrameError>> {
        if self.framer.discarding {
            self.cursor += size;
            return None;
        }
        if size > self.framer.max_record_bytes {
            self.framer.discarding = true;
            self.cursor += size;
            return Some(Err(FrameError::RecordTooLarge {
                size,
                max_size: self.framer.max_record_bytes,
            }));
        }
        None
    }
}

impl Drop for Records<'_> {
    fn drop(&mut self) {
        let consumed = self.cursor.min(self.framer.pending.len());
        drop(self.framer.pending.drain(..consumed));
    }
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}
