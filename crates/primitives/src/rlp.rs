// Copyright 2024 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Canonical RLP encoding and decoding.
//!
//! RLP is the byte-level serialization used for every consensus-relevant
//! structure: trie nodes, transactions, headers and receipts. Encoding is
//! injective — every item has exactly one valid byte representation — and the
//! decoder rejects all non-canonical forms so that `decode(encode(x)) == x`
//! and nothing else decodes to `x`.

use alloy_primitives::{Address, Bloom, Bytes, B256, B64, U256};
use thiserror::Error as ThisError;

/// Prefix of the empty byte string, `0x80`.
pub const EMPTY_STRING_CODE: u8 = 0x80;
/// Prefix of the empty list, `0xc0`.
pub const EMPTY_LIST_CODE: u8 = 0xc0;

/// Errors raised while decoding RLP data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum Error {
    /// The input ended before the announced payload.
    #[error("input too short")]
    Truncated,
    /// A length field is wider than the platform can address.
    #[error("length field too large")]
    OversizeLength,
    /// A multi-byte length field or integer starts with a zero byte.
    #[error("leading zero byte in length or integer")]
    LeadingZero,
    /// A length prefix encodes a value that has a shorter canonical form.
    #[error("non-canonical length prefix")]
    NonCanonicalLength,
    /// A byte string was found where a list was expected.
    #[error("expected a list")]
    UnexpectedString,
    /// A list was found where a byte string was expected.
    #[error("expected a byte string")]
    UnexpectedList,
    /// A fixed-size item has the wrong payload length.
    #[error("unexpected payload length")]
    UnexpectedLength,
    /// An integer does not fit the target type.
    #[error("integer overflow")]
    Overflow,
    /// Bytes remain after the top-level item in strict mode.
    #[error("trailing bytes after item")]
    Trailing,
}

/// The length prefix of a byte string or list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// True for lists, false for byte strings.
    pub list: bool,
    /// Length of the payload in bytes.
    pub payload_length: usize,
}

impl Header {
    /// Encodes the header into `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let code = if self.list {
            EMPTY_LIST_CODE
        } else {
            EMPTY_STRING_CODE
        };
        if self.payload_length < 56 {
            out.push(code + self.payload_length as u8);
        } else {
            let len_be = to_be_trimmed(self.payload_length as u64);
            out.push(code + 55 + len_be.len() as u8);
            out.extend_from_slice(&len_be);
        }
    }

    /// Decodes a header from the front of `buf`.
    ///
    /// A single byte below `0x80` is its own payload: the returned header
    /// announces a one-byte string and the byte is left in the buffer.
    pub fn decode(buf: &mut &[u8]) -> Result<Self, Error> {
        let &first = buf.first().ok_or(Error::Truncated)?;
        let header = match first {
            0x00..=0x7f => {
                return Ok(Header {
                    list: false,
                    payload_length: 1,
                })
            }
            0x80..=0xb7 => {
                *buf = &buf[1..];
                let payload_length = (first - EMPTY_STRING_CODE) as usize;
                if payload_length == 1 && *buf.first().ok_or(Error::Truncated)? < 0x80 {
                    // should have been encoded as the byte itself
                    return Err(Error::NonCanonicalLength);
                }
                Header {
                    list: false,
                    payload_length,
                }
            }
            0xb8..=0xbf => {
                *buf = &buf[1..];
                Header {
                    list: false,
                    payload_length: decode_long_length(buf, (first - 0xb7) as usize)?,
                }
            }
            0xc0..=0xf7 => {
                *buf = &buf[1..];
                Header {
                    list: true,
                    payload_length: (first - EMPTY_LIST_CODE) as usize,
                }
            }
            0xf8..=0xff => {
                *buf = &buf[1..];
                Header {
                    list: true,
                    payload_length: decode_long_length(buf, (first - 0xf7) as usize)?,
                }
            }
        };
        if header.payload_length > buf.len() {
            return Err(Error::Truncated);
        }
        Ok(header)
    }
}

/// Decodes a big-endian length field of `len_of_len` bytes.
fn decode_long_length(buf: &mut &[u8], len_of_len: usize) -> Result<usize, Error> {
    if len_of_len > core::mem::size_of::<usize>() {
        return Err(Error::OversizeLength);
    }
    if buf.len() < len_of_len {
        return Err(Error::Truncated);
    }
    let (len_bytes, rest) = buf.split_at(len_of_len);
    if len_bytes[0] == 0 {
        return Err(Error::LeadingZero);
    }
    let mut length = 0usize;
    for &byte in len_bytes {
        length = (length << 8) | byte as usize;
    }
    if length < 56 {
        // would fit in the short form
        return Err(Error::NonCanonicalLength);
    }
    *buf = rest;
    Ok(length)
}

/// The length of the length prefix for a payload of `payload_length` bytes.
pub fn length_of_length(payload_length: usize) -> usize {
    if payload_length < 56 {
        1
    } else {
        1 + to_be_trimmed(payload_length as u64).len()
    }
}

fn to_be_trimmed(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    bytes[(value.leading_zeros() / 8) as usize..].to_vec()
}

/// A type that can be RLP-encoded.
pub trait Encodable {
    /// Appends the encoding of `self` to `out`.
    fn encode(&self, out: &mut Vec<u8>);
    /// The length of the encoding in bytes.
    fn length(&self) -> usize;
}

/// A type that can be decoded from canonical RLP.
pub trait Decodable: Sized {
    /// Decodes an instance from the front of `buf`, advancing it past the
    /// consumed bytes.
    fn decode(buf: &mut &[u8]) -> Result<Self, Error>;
}

/// Encodes `value` into a fresh byte vector.
pub fn encode<T: Encodable + ?Sized>(value: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.length());
    value.encode(&mut out);
    out
}

/// Decodes a single item from `bytes`, rejecting trailing data.
pub fn decode<T: Decodable>(mut bytes: &[u8]) -> Result<T, Error> {
    let value = T::decode(&mut bytes)?;
    if !bytes.is_empty() {
        return Err(Error::Trailing);
    }
    Ok(value)
}

/// Convenience conversion to owned RLP bytes.
pub trait RlpBytes {
    /// Returns the RLP encoding.
    fn to_rlp(&self) -> Vec<u8>;
}

impl<T: Encodable + ?Sized> RlpBytes for T {
    #[inline]
    fn to_rlp(&self) -> Vec<u8> {
        encode(self)
    }
}

impl<T: Encodable + ?Sized> Encodable for &T {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        (**self).encode(out)
    }

    #[inline]
    fn length(&self) -> usize {
        (**self).length()
    }
}

/// Decodes a byte-string payload, returning a subslice of the input.
pub fn decode_bytes<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], Error> {
    let header = Header::decode(buf)?;
    if header.list {
        return Err(Error::UnexpectedList);
    }
    let (payload, rest) = buf.split_at(header.payload_length);
    *buf = rest;
    Ok(payload)
}

/// Encodes `items` as an RLP list.
pub fn encode_list<T: Encodable>(items: &[T], out: &mut Vec<u8>) {
    let payload_length = items.iter().map(Encodable::length).sum();
    Header {
        list: true,
        payload_length,
    }
    .encode(out);
    for item in items {
        item.encode(out);
    }
}

/// The encoded length of `items` as an RLP list.
pub fn list_length<T: Encodable>(items: &[T]) -> usize {
    let payload_length: usize = items.iter().map(Encodable::length).sum();
    length_of_length(payload_length) + payload_length
}

impl Encodable for [u8] {
    fn encode(&self, out: &mut Vec<u8>) {
        if self.len() == 1 && self[0] < EMPTY_STRING_CODE {
            out.push(self[0]);
        } else {
            Header {
                list: false,
                payload_length: self.len(),
            }
            .encode(out);
            out.extend_from_slice(self);
        }
    }

    fn length(&self) -> usize {
        if self.len() == 1 && self[0] < EMPTY_STRING_CODE {
            1
        } else {
            length_of_length(self.len()) + self.len()
        }
    }
}

impl Encodable for Vec<u8> {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        self.as_slice().encode(out)
    }

    #[inline]
    fn length(&self) -> usize {
        self.as_slice().length()
    }
}

impl Decodable for Vec<u8> {
    fn decode(buf: &mut &[u8]) -> Result<Self, Error> {
        decode_bytes(buf).map(<[u8]>::to_vec)
    }
}

impl Encodable for Bytes {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        self.as_ref().encode(out)
    }

    #[inline]
    fn length(&self) -> usize {
        self.as_ref().length()
    }
}

impl Decodable for Bytes {
    fn decode(buf: &mut &[u8]) -> Result<Self, Error> {
        decode_bytes(buf).map(|bytes| Bytes::copy_from_slice(bytes))
    }
}

impl Encodable for bool {
    fn encode(&self, out: &mut Vec<u8>) {
        (*self as u64).encode(out)
    }

    fn length(&self) -> usize {
        1
    }
}

impl Decodable for bool {
    fn decode(buf: &mut &[u8]) -> Result<Self, Error> {
        match u64::decode(buf)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::Overflow),
        }
    }
}

impl Encodable for u64 {
    fn encode(&self, out: &mut Vec<u8>) {
        to_be_trimmed(*self).encode(out)
    }

    fn length(&self) -> usize {
        to_be_trimmed(*self).length()
    }
}

impl Decodable for u64 {
    fn decode(buf: &mut &[u8]) -> Result<Self, Error> {
        let bytes = decode_bytes(buf)?;
        decode_uint_be(bytes)
    }
}

impl Encodable for usize {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        (*self as u64).encode(out)
    }

    #[inline]
    fn length(&self) -> usize {
        (*self as u64).length()
    }
}

impl Decodable for usize {
    fn decode(buf: &mut &[u8]) -> Result<Self, Error> {
        u64::decode(buf)?.try_into().map_err(|_| Error::Overflow)
    }
}

fn decode_uint_be(bytes: &[u8]) -> Result<u64, Error> {
    if bytes.len() > core::mem::size_of::<u64>() {
        return Err(Error::Overflow);
    }
    if bytes.first() == Some(&0) {
        return Err(Error::LeadingZero);
    }
    let mut value = 0u64;
    for &byte in bytes {
        value = (value << 8) | byte as u64;
    }
    Ok(value)
}

impl Encodable for U256 {
    fn encode(&self, out: &mut Vec<u8>) {
        self.to_be_bytes_trimmed_vec().encode(out)
    }

    fn length(&self) -> usize {
        self.to_be_bytes_trimmed_vec().length()
    }
}

impl Decodable for U256 {
    fn decode(buf: &mut &[u8]) -> Result<Self, Error> {
        let bytes = decode_bytes(buf)?;
        if bytes.len() > 32 {
            return Err(Error::Overflow);
        }
        if bytes.first() == Some(&0) {
            return Err(Error::LeadingZero);
        }
        Ok(U256::from_be_slice(bytes))
    }
}

macro_rules! impl_rlp_fixed_bytes {
    ($($t:ty),*) => {$(
        impl Encodable for $t {
            #[inline]
            fn encode(&self, out: &mut Vec<u8>) {
                self.as_slice().encode(out)
            }

            #[inline]
            fn length(&self) -> usize {
                self.as_slice().length()
            }
        }

        impl Decodable for $t {
            fn decode(buf: &mut &[u8]) -> Result<Self, Error> {
                let bytes = decode_bytes(buf)?;
                if bytes.len() != <$t>::len_bytes() {
                    return Err(Error::UnexpectedLength);
                }
                Ok(<$t>::from_slice(bytes))
            }
        }
    )*};
}

impl_rlp_fixed_bytes!(B64, B256, Bloom);

impl Encodable for Address {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        self.as_slice().encode(out)
    }

    #[inline]
    fn length(&self) -> usize {
        self.as_slice().length()
    }
}

impl Decodable for Address {
    fn decode(buf: &mut &[u8]) -> Result<Self, Error> {
        let bytes = decode_bytes(buf)?;
        if bytes.len() != Address::len_bytes() {
            return Err(Error::UnexpectedLength);
        }
        Ok(Address::from_slice(bytes))
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn single_bytes() {
        assert_eq!(encode(&[0x00u8][..]), vec![0x00]);
        assert_eq!(encode(&[0x7fu8][..]), vec![0x7f]);
        assert_eq!(encode(&[0x80u8][..]), vec![0x81, 0x80]);
        assert_eq!(encode::<[u8]>(&[]), vec![0x80]);
    }

    #[test]
    fn integers() {
        assert_eq!(encode(&0u64), vec![0x80]);
        assert_eq!(encode(&15u64), vec![0x0f]);
        assert_eq!(encode(&1024u64), vec![0x82, 0x04, 0x00]);
        assert_eq!(decode::<u64>(&[0x82, 0x04, 0x00]).unwrap(), 1024);
        assert_eq!(decode::<U256>(&[0x80]).unwrap(), U256::ZERO);
    }

    #[test]
    fn long_string() {
        // "Lorem ipsum dolor sit amet, consectetur adipisicing elit"
        let input = b"Lorem ipsum dolor sit amet, consectetur adipisicing elit".to_vec();
        let encoded = encode(&input);
        assert_eq!(&encoded[..2], &[0xb8, 0x38]);
        assert_eq!(decode::<Vec<u8>>(&encoded).unwrap(), input);
    }

    #[test]
    fn round_trip_header() {
        for payload_length in [0usize, 1, 55, 56, 255, 256, 65536] {
            for list in [false, true] {
                let header = Header {
                    list,
                    payload_length,
                };
                let mut out = vec![];
                header.encode(&mut out);
                out.resize(out.len() + payload_length, 0xaa);
                let mut buf = out.as_slice();
                assert_eq!(Header::decode(&mut buf).unwrap(), header);
            }
        }
    }

    #[test]
    fn rejects_non_canonical() {
        // 0x00 must encode as itself, not as a one-byte string
        assert_eq!(decode::<u64>(&[0x81, 0x00]), Err(Error::NonCanonicalLength));
        // long form used for a short payload
        assert_eq!(
            decode::<Vec<u8>>(&[0xb8, 0x01, 0xff]),
            Err(Error::NonCanonicalLength)
        );
        // leading zero in a length field
        assert_eq!(
            decode::<Vec<u8>>(&hex!("b90000")),
            Err(Error::LeadingZero)
        );
        // leading zero in an integer
        assert_eq!(decode::<u64>(&[0x82, 0x00, 0x01]), Err(Error::LeadingZero));
    }

    #[test]
    fn rejects_truncated() {
        assert_eq!(decode::<Vec<u8>>(&[0x83, 0x01]), Err(Error::Truncated));
        assert_eq!(decode::<Vec<u8>>(&[0xb8]), Err(Error::Truncated));
        assert_eq!(decode::<Vec<u8>>(&[]), Err(Error::Truncated));
    }

    #[test]
    fn rejects_trailing() {
        assert_eq!(decode::<u64>(&[0x01, 0x02]), Err(Error::Trailing));
    }

    #[test]
    fn list_encoding() {
        // [ "cat", "dog" ]
        let items = [b"cat".to_vec(), b"dog".to_vec()];
        let mut out = vec![];
        encode_list(&items, &mut out);
        assert_eq!(out, hex!("c88363617483646f67"));
        assert_eq!(list_length(&items), out.len());
    }

    #[test]
    fn fixed_bytes() {
        let hash = B256::repeat_byte(0x7f);
        let encoded = encode(&hash);
        assert_eq!(encoded.len(), 33);
        assert_eq!(decode::<B256>(&encoded).unwrap(), hash);

        let address = Address::repeat_byte(0x11);
        assert_eq!(decode::<Address>(&encode(&address)).unwrap(), address);
    }
}
