//! Payload serialization for request and reply envelopes.
//!
//! A [`Codec`] turns a request value into the opaque `msg` bytes of a
//! [`GameMsg`](gamelink_core::proto::GameMsg) and turns reply bytes back into
//! typed values. Payloads are a *sequence* of encoded values: a reply may carry
//! several values back to back, and a caller decodes as many of them as it has
//! reply targets for. [`ValueReader`] walks that sequence one value at a time.
//!
//! The default [`MsgPackCodec`] encodes structs as named-field maps so payloads
//! stay readable by peers written in other languages.

use bytes::Bytes;
use gamelink_core::{Error, Result};
use serde::{Serialize, de::DeserializeOwned};

/// Pluggable payload serialization.
pub trait Codec: Clone + Send + Sync + 'static {
    /// Reader over the values packed into a single payload.
    type Reader<'a>: ValueReader;

    /// Encode a single value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the value cannot be represented.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes>;

    /// Returns a reader positioned at the first value of `payload`.
    fn reader<'a>(&self, payload: &'a [u8]) -> Self::Reader<'a>;

    /// Decode the first value of `payload`. Trailing values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the payload does not hold a `T`.
    fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T> {
        self.reader(payload).next()
    }

    /// Decode consecutive values of `payload`, one per element of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if any target fails to decode.
    fn decode_all<T: ReplyTargets>(&self, payload: &[u8]) -> Result<T> {
        T::read_from(&mut self.reader(payload))
    }
}

/// Sequential access to the values packed into one payload.
pub trait ValueReader {
    /// Decode the next value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the next value is missing or malformed.
    fn next<T: DeserializeOwned>(&mut self) -> Result<T>;
}

/// A set of reply targets filled from consecutive payload values.
///
/// Implemented for tuples of up to four [`DeserializeOwned`] values; a tuple
/// `(A, B)` reads an `A` and then a `B` from the same payload.
pub trait ReplyTargets: Sized {
    /// Fill every target from `reader`, in order.
    ///
    /// # Errors
    ///
    /// Returns the first decode failure.
    fn read_from<R: ValueReader>(reader: &mut R) -> Result<Self>;
}

macro_rules! impl_reply_targets {
    ($($name:ident),+) => {
        impl<$($name: DeserializeOwned),+> ReplyTargets for ($($name,)+) {
            fn read_from<R: ValueReader>(reader: &mut R) -> Result<Self> {
                Ok(($(reader.next::<$name>()?,)+))
            }
        }
    };
}

impl_reply_targets!(A);
impl_reply_targets!(A, B);
impl_reply_targets!(A, B, C);
impl_reply_targets!(A, B, C, D);

/// MessagePack codec backed by `rmp-serde`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MsgPackCodec;

/// [`ValueReader`] over a MessagePack payload.
pub struct MsgPackReader<'a> {
    de: rmp_serde::Deserializer<rmp_serde::decode::ReadReader<&'a [u8]>>,
}

impl ValueReader for MsgPackReader<'_> {
    fn next<T: DeserializeOwned>(&mut self) -> Result<T> {
        T::deserialize(&mut self.de).map_err(|e| Error::Decode {
            reason: e.to_string(),
        })
    }
}

impl Codec for MsgPackCodec {
    type Reader<'a> = MsgPackReader<'a>;

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes> {
        rmp_serde::to_vec_named(value)
            .map(Bytes::from)
            .map_err(|e| Error::Encode {
                reason: e.to_string(),
            })
    }

    fn reader<'a>(&self, payload: &'a [u8]) -> Self::Reader<'a> {
        MsgPackReader {
            de: rmp_serde::Deserializer::new(payload),
        }
    }
}
