use std::fmt::Display;
use std::io::Write;

/// Accumulates a payload.
///
/// Tokens are separated by a single space; nothing is written before the
/// first one or after the last one.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
    started: bool,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn separate(&mut self) {
        if self.started {
            self.buf.push(b' ');
        }
        self.started = true;
    }

    /// Writes one whitespace-free token using its `Display` form.
    pub fn token(&mut self, value: impl Display) {
        self.separate();
        // Writing into a Vec cannot fail
        let _ = write!(self.buf, "{}", value);
    }

    /// Writes `<len> <bytes>`; the bytes may contain anything, whitespace
    /// included.
    pub fn bytes(&mut self, bytes: &[u8]) {
        self.token(bytes.len());
        self.buf.push(b' ');
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
