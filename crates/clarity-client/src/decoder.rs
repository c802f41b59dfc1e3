//! Line framing for streamed response bodies.
//!
//! Response bodies arrive in arbitrary chunks. A chunk may end in the middle of
//! a line or in the middle of a multi-byte UTF-8 character, so the decoder
//! carries both over to the next chunk.

/// Incremental UTF-8 line decoder.
///
/// Feed chunks in arrival order via [`decode`](Self::decode); call
/// [`finish`](Self::finish) once the body ends to flush the last partial line.
/// Lines are split on `\n` only and returned without it; a `\r` before the
/// newline stays part of the line.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes of an incomplete UTF-8 sequence at the end of the last chunk.
    utf8_tail: Vec<u8>,
    /// Decoded text not yet terminated by a newline.
    line: String,
}

impl FrameDecoder {
    /// Create a new decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk` and yield every line it completes.
    ///
    /// Lines are split off lazily. Any the caller leaves unread stay buffered
    /// and come out of the next call.
    ///
    /// Invalid byte sequences decode to U+FFFD; decoding continues after them.
    pub fn decode(&mut self, chunk: &[u8]) -> Lines<'_> {
        self.push_utf8(chunk);
        Lines {
            buffer: &mut self.line,
            start: 0,
        }
    }

    /// Flush the decoder at end of stream.
    ///
    /// Returns the final line if the body did not end with a newline.
    pub fn finish(&mut self) -> Option<String> {
        if !self.utf8_tail.is_empty() {
            self.utf8_tail.clear();
            self.line.push(char::REPLACEMENT_CHARACTER);
        }
        if self.line.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.line))
        }
    }

    /// Whether undelivered text or bytes are buffered.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.line.is_empty() || !self.utf8_tail.is_empty()
    }

    fn push_utf8(&mut self, chunk: &[u8]) {
        let joined;
        let mut input = if self.utf8_tail.is_empty() {
            chunk
        } else {
            let mut bytes = std::mem::take(&mut self.utf8_tail);
            bytes.extend_from_slice(chunk);
            joined = bytes;
            joined.as_slice()
        };

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.line.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    self.line.push_str(&String::from_utf8_lossy(valid));
                    if let Some(invalid_len) = err.error_len() {
                        self.line.push(char::REPLACEMENT_CHARACTER);
                        input = &rest[invalid_len..];
                    } else {
                        // Sequence continues in the next chunk.
                        self.utf8_tail = rest.to_vec();
                        return;
                    }
                }
            }
        }
    }
}

/// Completed lines from one [`FrameDecoder::decode`] call.
#[derive(Debug)]
pub struct Lines<'a> {
    buffer: &'a mut String,
    /// Offset of the first byte not yet yielded.
    start: usize,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let pos = self.buffer[self.start..].find('\n')?;
        let line = self.buffer[self.start..self.start + pos].to_string();
        self.start += pos + 1;
        Some(line)
    }
}

impl Drop for Lines<'_> {
    fn drop(&mut self) {
        self.buffer.drain(..self.start);
    }
}
