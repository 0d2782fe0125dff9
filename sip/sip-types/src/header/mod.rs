//! Header names, the header map and typed headers

use anyhow::{Context, Result};
use bytes::Bytes;
use bytesstr::BytesStr;

mod error;
pub mod headers;
pub mod name;
pub mod typed;

pub use error::HeaderError;
use name::Name;

/// Header type with a fixed [`Name`], used by the `*_named` methods of [`Headers`](headers::Headers)
pub trait ConstNamed {
    const NAME: Name;
}

/// Decode a header from all values stored under its name.
///
/// `values` always yields at least one item.
pub trait DecodeValues: Sized {
    fn decode<'i, I>(values: &mut I) -> Result<Self>
    where
        I: Iterator<Item = &'i BytesStr>;
}

/// Parse a single header value. `src` is the buffer `i` points into.
///
/// Returns the remaining input so comma separated lists can be split by the caller.
pub trait HeaderParse: Sized {
    fn parse<'i>(src: &Bytes, i: &'i str) -> Result<(&'i str, Self)>;
}

pub(crate) fn nom_error(e: nom::error::VerboseError<&str>) -> anyhow::Error {
    anyhow::Error::msg(internal::verbose_error_to_owned(e).to_string())
}

impl<H: HeaderParse> DecodeValues for H {
    fn decode<'i, I>(values: &mut I) -> Result<Self>
    where
        I: Iterator<Item = &'i BytesStr>,
    {
        let value = values.next().context("header has no values")?;
        let (_, header) = H::parse(value.as_ref(), value.as_str())?;
        Ok(header)
    }
}

impl<H: ConstNamed> ConstNamed for Vec<H> {
    const NAME: Name = H::NAME;
}

/// Comma separated and repeated header values are both flattened into one list
impl<H: HeaderParse> DecodeValues for Vec<H> {
    fn decode<'i, I>(values: &mut I) -> Result<Self>
    where
        I: Iterator<Item = &'i BytesStr>,
    {
        let mut list = Vec::new();

        for value in values {
            let mut i = value.as_str();

            loop {
                let (rem, header) = H::parse(value.as_ref(), i)?;
                list.push(header);

                match rem.trim_start().strip_prefix(',') {
                    Some(rem) => i = rem.trim_start(),
                    None => break,
                }
            }
        }

        Ok(list)
    }
}

/// Header wrapping a comma separated list item
macro_rules! csv_header {
    ($(#[$meta:meta])* $name:ident, $wrapping:ty, $header_name:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub $wrapping);

        impl crate::header::ConstNamed for $name {
            const NAME: crate::Name = $header_name;
        }

        impl crate::header::HeaderParse for $name {
            fn parse<'i>(src: &bytes::Bytes, i: &'i str) -> anyhow::Result<(&'i str, Self)> {
                let (item, rem) = match i.find(',') {
                    Some(idx) => (&i[..idx], &i[idx..]),
                    None => (i, ""),
                };

                let item = item.trim();

                if item.is_empty() {
                    anyhow::bail!("empty list item");
                }

                Ok((rem, Self(<$wrapping>::from_parse(src, item))))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

/// Header consisting of a single value parsed with [`FromStr`](std::str::FromStr)
macro_rules! from_str_header {
    ($(#[$meta:meta])* $name:ident, $header_name:expr, $ty:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name(pub $ty);

        impl crate::header::ConstNamed for $name {
            const NAME: crate::Name = $header_name;
        }

        impl crate::header::HeaderParse for $name {
            fn parse<'i>(_: &bytes::Bytes, i: &'i str) -> anyhow::Result<(&'i str, Self)> {
                Ok(("", Self(i.trim().parse()?)))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

/// Header taking its complete value as text
macro_rules! text_header {
    ($(#[$meta:meta])* $name:ident, $header_name:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(pub bytesstr::BytesStr);

        impl $name {
            pub fn new(value: impl Into<bytesstr::BytesStr>) -> Self {
                Self(value.into())
            }
        }

        impl crate::header::ConstNamed for $name {
            const NAME: crate::Name = $header_name;
        }

        impl crate::header::HeaderParse for $name {
            fn parse<'i>(src: &bytes::Bytes, i: &'i str) -> anyhow::Result<(&'i str, Self)> {
                Ok(("", Self(bytesstr::BytesStr::from_parse(src, i.trim()))))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

pub(crate) use {csv_header, from_str_header, text_header};
