//! Incremental UTF-8 decoding of a chunked response body.
//!
//! Network chunks may split a multi-byte character. [`Utf8Decoder`] holds
//! back an incomplete trailing sequence until the next chunk completes it,
//! and replaces genuinely invalid bytes with U+FFFD.

/// Streaming UTF-8 decoder
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + chunk` as forms complete characters.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        let mut input: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    input = &[];
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            input = rest;
                            break;
                        }
                    }
                }
            }
        }

        let consumed = self.pending.len() - input.len();
        self.pending.drain(..consumed);
        out
    }

    /// Flush whatever is left at end of body.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
