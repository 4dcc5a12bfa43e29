// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::{Error, Result};

pub const TAG_TYPE_BITS: u32 = 3;
pub const TAG_TYPE_MASK: u32 = (1 << TAG_TYPE_BITS) - 1;

/// Largest field number that fits in a tag alongside the wire type.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// How a field's value is physically framed on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
  Varint = 0,
  Fixed64 = 1,
  LengthDelimited = 2,
  StartGroup = 3,
  EndGroup = 4,
  Fixed32 = 5,
}

impl WireType {
  /// Whether a repeated field of this wire type may be packed into a single length-delimited run.
  #[must_use]
  pub const fn is_packable(self) -> bool {
    matches!(self, Self::Varint | Self::Fixed32 | Self::Fixed64)
  }
}

impl TryFrom<u32> for WireType {
  type Error = Error;

  fn try_from(tag: u32) -> Result<Self> {
    match tag & TAG_TYPE_MASK {
      0 => Ok(Self::Varint),
      1 => Ok(Self::Fixed64),
      2 => Ok(Self::LengthDelimited),
      3 => Ok(Self::StartGroup),
      4 => Ok(Self::EndGroup),
      5 => Ok(Self::Fixed32),
      _ => Err(Error::InvalidWireType(tag)),
    }
  }
}

#[must_use]
pub const fn make_tag(field_number: u32, wire_type: WireType) -> u32 {
  (field_number << TAG_TYPE_BITS) | wire_type as u32
}

#[must_use]
pub const fn tag_field_number(tag: u32) -> u32 {
  tag >> TAG_TYPE_BITS
}

pub fn tag_wire_type(tag: u32) -> Result<WireType> {
  WireType::try_from(tag)
}

/// Field numbers and tags of the legacy MessageSet item group:
/// `StartGroup(1) TypeID(2, varint) Message(3, length-delimited) EndGroup(1)`.
pub mod message_set {
  use super::{WireType, make_tag};

  pub const ITEM: u32 = 1;
  pub const TYPE_ID: u32 = 2;
  pub const MESSAGE: u32 = 3;

  pub const ITEM_TAG: u32 = make_tag(ITEM, WireType::StartGroup);
  pub const ITEM_END_TAG: u32 = make_tag(ITEM, WireType::EndGroup);
  pub const TYPE_ID_TAG: u32 = make_tag(TYPE_ID, WireType::Varint);
  pub const MESSAGE_TAG: u32 = make_tag(MESSAGE, WireType::LengthDelimited);
}
