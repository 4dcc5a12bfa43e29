// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

//! Base-128 varints. Each byte carries 7 data bits, least significant group first, with the high
//! bit set on every byte except the last.

#[cfg(test)]
#[path = "./varint_test.rs"]
mod varint_test;

use crate::{Error, Result};
use bytes::{Buf, BufMut};

/// Maximum varint size for u64 (10 bytes).
pub const MAX_SIZE: usize = 10;

/// Maximum varint size for u32 (5 bytes).
pub const MAX_SIZE_32: usize = 5;

/// Size of a u32 when encoded as a varint.
#[must_use]
pub const fn compute_size32(value: u32) -> usize {
  let bits = 32 - (value | 1).leading_zeros() as usize;
  bits.div_ceil(7)
}

/// Size of a u64 when encoded as a varint.
#[must_use]
pub const fn compute_size64(value: u64) -> usize {
  let bits = 64 - (value | 1).leading_zeros() as usize;
  bits.div_ceil(7)
}

/// Encode a u32 as a varint. Returns the number of bytes written.
pub fn encode_varint32<B: BufMut>(value: u32, buf: &mut B) -> usize {
  encode_varint64(u64::from(value), buf)
}

/// Encode a u64 as a varint. Returns the number of bytes written.
pub fn encode_varint64<B: BufMut>(mut value: u64, buf: &mut B) -> usize {
  let mut written = 0;
  while value >= 0x80 {
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u8((value as u8 & 0x7F) | 0x80);
    value >>= 7;
    written += 1;
  }
  #[allow(clippy::cast_possible_truncation)]
  buf.put_u8(value as u8);
  written + 1
}

/// Decode a varint into a u64, advancing the buffer past it.
///
/// Fails with [`Error::TruncatedMessage`] if the buffer ends before the final byte, and with
/// [`Error::MalformedVarint`] if more than [`MAX_SIZE`] bytes carry the continuation bit.
pub fn decode_varint64<B: Buf>(buf: &mut B) -> Result<u64> {
  let mut result = 0u64;
  for i in 0 .. MAX_SIZE {
    if !buf.has_remaining() {
      return Err(Error::TruncatedMessage);
    }
    let byte = buf.get_u8();
    result |= u64::from(byte & 0x7F) << (7 * i);
    if byte < 0x80 {
      return Ok(result);
    }
  }

  Err(Error::MalformedVarint)
}

/// Decode a varint into a u32. Negative int32 values are sign extended to 10 bytes on the wire so
/// the full 64-bit form is consumed and the upper bits are discarded.
#[allow(clippy::cast_possible_truncation)]
pub fn decode_varint32<B: Buf>(buf: &mut B) -> Result<u32> {
  decode_varint64(buf).map(|value| value as u32)
}

#[must_use]
pub const fn encode_zig_zag32(n: i32) -> u32 {
  #[allow(clippy::cast_sign_loss)]
  let encoded = ((n << 1) ^ (n >> 31)) as u32;
  encoded
}

#[must_use]
pub const fn decode_zig_zag32(n: u32) -> i32 {
  #[allow(clippy::cast_possible_wrap)]
  let decoded = ((n >> 1) as i32) ^ -((n & 1) as i32);
  decoded
}

#[must_use]
pub const fn encode_zig_zag64(n: i64) -> u64 {
  #[allow(clippy::cast_sign_loss)]
  let encoded = ((n << 1) ^ (n >> 63)) as u64;
  encoded
}

#[must_use]
pub const fn decode_zig_zag64(n: u64) -> i64 {
  #[allow(clippy::cast_possible_wrap)]
  let decoded = ((n >> 1) as i64) ^ -((n & 1) as i64);
  decoded
}
