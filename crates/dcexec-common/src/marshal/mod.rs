//! Typed argument codec.
//!
//! Call arguments travel to a remote program on its stdin and the result
//! comes back on its stdout, so both are flattened into a whitespace
//! separated text payload:
//!
//! - scalars are written as decimal text (`bool` as `1`/`0`, `char` as its
//!   code point)
//! - strings are `<byte length> <raw bytes>`
//! - sequences and maps are `<count> <elem> <elem> ...`
//! - pairs and tuples are their members' encodings back to back, with no
//!   framing of their own
//!
//! The remote side only ever needs the mirror-image reader for the types it
//! exchanges. A new composite type needs nothing more than an [`Encode`] and
//! a [`Decode`] impl written in terms of types that already have one:
//!
//! ```
//! use dcexec_common::marshal::{self, Decode, Decoder, Encode, Encoder};
//! use dcexec_common::Result;
//!
//! #[derive(Debug, PartialEq)]
//! struct Sample {
//!     label: String,
//!     values: Vec<i64>,
//! }
//!
//! impl Encode for Sample {
//!     fn encode(&self, out: &mut Encoder) {
//!         self.label.encode(out);
//!         self.values.encode(out);
//!     }
//! }
//!
//! impl Decode for Sample {
//!     fn decode(input: &mut Decoder<'_>) -> Result<Self> {
//!         Ok(Sample {
//!             label: String::decode(input)?,
//!             values: Vec::decode(input)?,
//!         })
//!     }
//! }
//!
//! let sample = Sample { label: "a b".into(), values: vec![-1, 2] };
//! let payload = marshal::to_payload(&sample);
//! assert_eq!(payload, b"3 a b 2 -1 2");
//! assert_eq!(marshal::from_payload::<Sample>(&payload).unwrap(), sample);
//! ```

mod decoder;
mod encoder;
mod impls;

pub use decoder::Decoder;
pub use encoder::Encoder;

use crate::protocol::error::Result;

/// A value that can be written into a payload.
pub trait Encode {
    fn encode(&self, out: &mut Encoder);
}

/// A value that can be read back out of a payload.
pub trait Decode: Sized {
    fn decode(input: &mut Decoder<'_>) -> Result<Self>;
}

/// Types that travel both ways.
pub trait Marshal: Encode + Decode {}

impl<T: Encode + Decode> Marshal for T {}

/// Encodes `value` into a standalone payload.
pub fn to_payload<T: Encode + ?Sized>(value: &T) -> Vec<u8> {
    let mut encoder = Encoder::new();
    value.encode(&mut encoder);
    encoder.finish()
}

/// Decodes a whole payload as `T`.
///
/// Trailing whitespace (such as the newline most programs print last) is
/// accepted; any other leftover input is a [`Marshal`](crate::DcexecError::Marshal)
/// error.
pub fn from_payload<T: Decode>(payload: &[u8]) -> Result<T> {
    let mut decoder = Decoder::new(payload);
    let value = T::decode(&mut decoder)?;
    decoder.finish()?;
    Ok(value)
}
