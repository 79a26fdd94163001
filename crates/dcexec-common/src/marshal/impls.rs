use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use super::{Decode, Decoder, Encode, Encoder};
use crate::protocol::error::{DcexecError, Result};

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, out: &mut Encoder) {
                    out.token(self);
                }
            }

            impl Decode for $ty {
                fn decode(input: &mut Decoder<'_>) -> Result<Self> {
                    input.parse(stringify!($ty))
                }
            }
        )*
    };
}

impl_scalar!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl Encode for bool {
    fn encode(&self, out: &mut Encoder) {
        out.token(u8::from(*self));
    }
}

impl Decode for bool {
    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        match input.token()? {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(DcexecError::Marshal(format!(
                "expected bool (0 or 1), found '{}'",
                other
            ))),
        }
    }
}

impl Encode for char {
    fn encode(&self, out: &mut Encoder) {
        out.token(u32::from(*self));
    }
}

impl Decode for char {
    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        let code: u32 = input.parse("char code point")?;
        char::from_u32(code)
            .ok_or_else(|| DcexecError::Marshal(format!("{} is not a valid char", code)))
    }
}

impl Encode for str {
    fn encode(&self, out: &mut Encoder) {
        out.bytes(self.as_bytes());
    }
}

impl Encode for String {
    fn encode(&self, out: &mut Encoder) {
        self.as_str().encode(out);
    }
}

impl Decode for String {
    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        let bytes = input.bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| DcexecError::Marshal(format!("string is not valid UTF-8: {}", e)))
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, out: &mut Encoder) {
        (**self).encode(out);
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, out: &mut Encoder) {
        (**self).encode(out);
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        T::decode(input).map(Box::new)
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, out: &mut Encoder) {
        out.token(self.len());
        for item in self {
            item.encode(out);
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, out: &mut Encoder) {
        self.as_slice().encode(out);
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        let (count, capacity) = input.count()?;
        let mut items = Vec::with_capacity(capacity);
        for _ in 0..count {
            let before = input.remaining();
            items.push(T::decode(input)?);
            input.ensure_progress(before, count)?;
        }
        Ok(items)
    }
}

/// `None` is an empty sequence, `Some(x)` a sequence of one.
impl<T: Encode> Encode for Option<T> {
    fn encode(&self, out: &mut Encoder) {
        match self {
            Some(value) => {
                out.token(1);
                value.encode(out);
            }
            None => out.token(0),
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        match input.parse::<usize>("option count")? {
            0 => Ok(None),
            1 => T::decode(input).map(Some),
            n => Err(DcexecError::Marshal(format!(
                "option count must be 0 or 1, found {}",
                n
            ))),
        }
    }
}

macro_rules! impl_map {
    ($map:ident, $($bound:path),+) => {
        impl<K: Encode, V: Encode> Encode for $map<K, V> {
            fn encode(&self, out: &mut Encoder) {
                out.token(self.len());
                for (key, value) in self {
                    key.encode(out);
                    value.encode(out);
                }
            }
        }

        impl<K: Decode $(+ $bound)+, V: Decode> Decode for $map<K, V> {
            fn decode(input: &mut Decoder<'_>) -> Result<Self> {
                let (count, _) = input.count()?;
                let mut map = $map::new();
                for _ in 0..count {
                    let before = input.remaining();
                    let key = K::decode(input)?;
                    let value = V::decode(input)?;
                    input.ensure_progress(before, count)?;
                    map.insert(key, value);
                }
                Ok(map)
            }
        }
    };
}

impl_map!(BTreeMap, Ord);
impl_map!(HashMap, Eq, Hash);

impl Encode for () {
    fn encode(&self, _out: &mut Encoder) {}
}

impl Decode for () {
    fn decode(_input: &mut Decoder<'_>) -> Result<Self> {
        Ok(())
    }
}

macro_rules! impl_tuple {
    ($($name:ident),+) => {
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            #[allow(non_snake_case)]
            fn encode(&self, out: &mut Encoder) {
                let ($($name,)+) = self;
                $($name.encode(out);)+
            }
        }

        impl<$($name: Decode),+> Decode for ($($name,)+) {
            fn decode(input: &mut Decoder<'_>) -> Result<Self> {
                Ok(($($name::decode(input)?,)+))
            }
        }
    };
}

impl_tuple!(A);
impl_tuple!(A, B);
impl_tuple!(A, B, C);
impl_tuple!(A, B, C, D);
impl_tuple!(A, B, C, D, E);
impl_tuple!(A, B, C, D, E, F);
impl_tuple!(A, B, C, D, E, F, G);
impl_tuple!(A, B, C, D, E, F, G, H);
