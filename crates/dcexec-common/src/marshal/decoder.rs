use std::str::FromStr;

use crate::protocol::error::{DcexecError, Result};

/// Reads values back out of a payload produced by [`Encoder`](super::Encoder)
/// or by a remote program following the same format.
#[derive(Debug)]
pub struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// Reads the next whitespace-delimited token.
    pub fn token(&mut self) -> Result<&'a str> {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.input.len() && !self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(DcexecError::Marshal(format!(
                "unexpected end of payload at byte {}",
                start
            )));
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| DcexecError::Marshal(format!("token at byte {} is not valid UTF-8", start)))
    }

    /// Reads the next token and parses it as `T`.
    pub fn parse<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.token()?;
        token
            .parse()
            .map_err(|_| DcexecError::Marshal(format!("expected {}, found '{}'", what, token)))
    }

    /// Reads a `<len> <bytes>` field.
    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        let len: usize = self.parse("byte length")?;
        if len == 0 && self.input[self.pos..].iter().all(u8::is_ascii_whitespace) {
            // An empty string written last may lose its separator to trimming
            // or be followed by a final newline
            return Ok(&[]);
        }
        if self.input.get(self.pos) != Some(&b' ') {
            return Err(DcexecError::Marshal(format!(
                "expected a single space after length at byte {}",
                self.pos
            )));
        }
        self.pos += 1;
        if len > self.remaining() {
            return Err(DcexecError::Marshal(format!(
                "payload truncated: need {} bytes, {} left",
                len,
                self.remaining()
            )));
        }
        let bytes = &self.input[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Reads a sequence count, capped so that a corrupt count cannot make
    /// callers preallocate more elements than bytes remain.
    pub fn count(&mut self) -> Result<(usize, usize)> {
        let count: usize = self.parse("element count")?;
        Ok((count, count.min(self.remaining())))
    }

    /// Fails when an element consumed no input although more elements are
    /// claimed than bytes remain.
    ///
    /// `before` is [`remaining`](Self::remaining) from just before the
    /// element was decoded. Elements that encode to nothing, such as `()`,
    /// could otherwise make a corrupt count loop for as long as it says.
    pub fn ensure_progress(&self, before: usize, count: usize) -> Result<()> {
        if self.remaining() == before && count > before {
            return Err(DcexecError::Marshal(format!(
                "count of {} empty elements exceeds the {} bytes left",
                count, before
            )));
        }
        Ok(())
    }

    /// Fails unless only whitespace is left.
    pub fn finish(&mut self) -> Result<()> {
        self.skip_whitespace();
        if self.pos != self.input.len() {
            return Err(DcexecError::Marshal(format!(
                "{} unexpected trailing bytes at byte {}",
                self.remaining(),
                self.pos
            )));
        }
        Ok(())
    }
}
