// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

//! Encoded size computation. Every function here must agree byte for byte with the matching
//! [`crate::CodedWriter`] method, since length prefixes are written before the bodies they
//! describe.

use crate::tag::{WireType, make_tag, message_set};
use crate::varint::{compute_size32, compute_size64, encode_zig_zag32, encode_zig_zag64};

pub const FIXED32_SIZE: usize = 4;
pub const FIXED64_SIZE: usize = 8;

#[must_use]
pub const fn tag_size(field_number: u32) -> usize {
  compute_size32(make_tag(field_number, WireType::Varint))
}

//
// Values without a tag
//

#[must_use]
pub const fn int32_size_no_tag(value: i32) -> usize {
  if value >= 0 {
    #[allow(clippy::cast_sign_loss)]
    let value = value as u32;
    compute_size32(value)
  } else {
    // Negative values are sign extended to 64 bits.
    crate::varint::MAX_SIZE
  }
}

#[must_use]
pub const fn int64_size_no_tag(value: i64) -> usize {
  #[allow(clippy::cast_sign_loss)]
  let value = value as u64;
  compute_size64(value)
}

#[must_use]
pub const fn uint32_size_no_tag(value: u32) -> usize {
  compute_size32(value)
}

#[must_use]
pub const fn uint64_size_no_tag(value: u64) -> usize {
  compute_size64(value)
}

#[must_use]
pub const fn sint32_size_no_tag(value: i32) -> usize {
  compute_size32(encode_zig_zag32(value))
}

#[must_use]
pub const fn sint64_size_no_tag(value: i64) -> usize {
  compute_size64(encode_zig_zag64(value))
}

#[must_use]
pub const fn enum_size_no_tag(value: i32) -> usize {
  int32_size_no_tag(value)
}

#[must_use]
pub const fn bool_size_no_tag() -> usize {
  1
}

/// Size of a length prefix plus `len` bytes of payload.
#[must_use]
pub const fn length_delimited_size_no_tag(len: usize) -> usize {
  compute_size64(len as u64) + len
}

#[must_use]
pub const fn string_size_no_tag(value: &str) -> usize {
  length_delimited_size_no_tag(value.len())
}

#[must_use]
pub const fn bytes_size_no_tag(value: &[u8]) -> usize {
  length_delimited_size_no_tag(value.len())
}

//
// Values with a tag
//

#[must_use]
pub const fn int32_size(field_number: u32, value: i32) -> usize {
  tag_size(field_number) + int32_size_no_tag(value)
}

#[must_use]
pub const fn int64_size(field_number: u32, value: i64) -> usize {
  tag_size(field_number) + int64_size_no_tag(value)
}

#[must_use]
pub const fn uint32_size(field_number: u32, value: u32) -> usize {
  tag_size(field_number) + uint32_size_no_tag(value)
}

#[must_use]
pub const fn uint64_size(field_number: u32, value: u64) -> usize {
  tag_size(field_number) + uint64_size_no_tag(value)
}

#[must_use]
pub const fn sint32_size(field_number: u32, value: i32) -> usize {
  tag_size(field_number) + sint32_size_no_tag(value)
}

#[must_use]
pub const fn sint64_size(field_number: u32, value: i64) -> usize {
  tag_size(field_number) + sint64_size_no_tag(value)
}

#[must_use]
pub const fn enum_size(field_number: u32, value: i32) -> usize {
  tag_size(field_number) + enum_size_no_tag(value)
}

#[must_use]
pub const fn fixed32_size(field_number: u32) -> usize {
  tag_size(field_number) + FIXED32_SIZE
}

#[must_use]
pub const fn fixed64_size(field_number: u32) -> usize {
  tag_size(field_number) + FIXED64_SIZE
}

#[must_use]
pub const fn bool_size(field_number: u32) -> usize {
  tag_size(field_number) + bool_size_no_tag()
}

#[must_use]
pub const fn string_size(field_number: u32, value: &str) -> usize {
  tag_size(field_number) + string_size_no_tag(value)
}

#[must_use]
pub const fn bytes_size(field_number: u32, value: &[u8]) -> usize {
  tag_size(field_number) + bytes_size_no_tag(value)
}

/// Size of an embedded message whose body serializes to `body_size` bytes.
#[must_use]
pub const fn message_size(field_number: u32, body_size: usize) -> usize {
  tag_size(field_number) + length_delimited_size_no_tag(body_size)
}

/// Size of a group whose body serializes to `body_size` bytes, including both group tags.
#[must_use]
pub const fn group_size(field_number: u32, body_size: usize) -> usize {
  2 * tag_size(field_number) + body_size
}

/// Size of a MessageSet item carrying a message body of `body_size` bytes.
#[must_use]
pub const fn message_set_extension_size(field_number: u32, body_size: usize) -> usize {
  2 * tag_size(message_set::ITEM)
    + uint32_size(message_set::TYPE_ID, field_number)
    + message_size(message_set::MESSAGE, body_size)
}
