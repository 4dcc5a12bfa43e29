// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#![allow(clippy::unwrap_used)]

use super::*;
use crate::ErrorKind;
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

#[ctor::ctor]
fn test_global_init() {
  pb_test_helpers::test_global_init();
}

// 1: varint 150, 2: fixed32, 3: "hi", 4: group { 1: varint 1 }, 5: fixed64.
const EVERY_WIRE_TYPE: &[u8] = &[
  0x08, 0x96, 0x01, //
  0x15, 0x01, 0x02, 0x03, 0x04, //
  0x1a, 0x02, b'h', b'i', //
  0x23, 0x08, 0x01, 0x24, //
  0x29, 1, 2, 3, 4, 5, 6, 7, 8,
];

#[test]
fn parse_every_wire_type() {
  let set = UnknownFieldSet::parse_from(EVERY_WIRE_TYPE).unwrap();
  assert_eq!(set.len(), 5);
  assert_eq!(set.get(1).varints(), &[150]);
  assert_eq!(set.get(2).fixed32s(), &[0x0403_0201]);
  assert_eq!(set.get(3).length_delimited(), &[Bytes::from_static(b"hi")]);
  assert_eq!(set.get(4).groups()[0].get(1).varints(), &[1]);
  assert_eq!(set.get(5).fixed64s(), &[0x0807_0605_0403_0201]);
  assert!(set.get(6).is_empty());
  assert!(!set.has_field(6));

  assert_eq!(set.serialized_size(), EVERY_WIRE_TYPE.len());
  assert_eq!(set.to_bytes().unwrap(), EVERY_WIRE_TYPE);
}

#[test]
fn output_is_ordered_by_field_number() {
  // 3: "a", 1: varint 1, 3: "b"
  let input = [0x1a, 0x01, b'a', 0x08, 0x01, 0x1a, 0x01, b'b'];
  let set = UnknownFieldSet::parse_from(&input).unwrap();
  assert_eq!(
    set.get(3).length_delimited(),
    &[Bytes::from_static(b"a"), Bytes::from_static(b"b")]
  );
  assert_eq!(
    set.to_bytes().unwrap(),
    vec![0x08, 0x01, 0x1a, 0x01, b'a', 0x1a, 0x01, b'b']
  );
}

#[test]
fn mixed_wire_types_for_one_number() {
  let mut field = UnknownField::new();
  field
    .add_length_delimited(&b"x"[..])
    .add_fixed32(7)
    .add_varint(3);
  let mut builder = UnknownFieldSetBuilder::new();
  builder.add_field(9, field).unwrap();
  let set = builder.build();

  // Varints first, then fixed32, then length-delimited.
  assert_eq!(
    set.to_bytes().unwrap(),
    vec![0x48, 0x03, 0x4d, 0x07, 0x00, 0x00, 0x00, 0x4a, 0x01, b'x']
  );
}

#[test]
fn builder_accumulates_across_interleaved_numbers() {
  let mut builder = UnknownFieldSetBuilder::new();
  builder
    .merge_varint_field(1, 1)
    .unwrap()
    .merge_varint_field(2, 2)
    .unwrap()
    .merge_varint_field(1, 3)
    .unwrap();
  assert!(builder.has_field(1));
  assert!(builder.has_field(2));
  assert!(!builder.has_field(3));

  let set = builder.build();
  assert_eq!(set.get(1).varints(), &[1, 3]);
  assert_eq!(set.get(2).varints(), &[2]);
}

#[test]
fn add_field_replaces() {
  let mut builder = UnknownFieldSetBuilder::new();
  builder.merge_varint_field(1, 1).unwrap();
  let mut replacement = UnknownField::new();
  replacement.add_fixed64(5);
  builder.add_field(1, replacement).unwrap();

  let set = builder.build();
  assert!(set.get(1).varints().is_empty());
  assert_eq!(set.get(1).fixed64s(), &[5]);

  let mut builder = set.to_builder();
  builder.add_field(1, UnknownField::new()).unwrap();
  assert!(builder.build().is_empty());
}

#[test]
fn field_number_zero_is_rejected() {
  let mut builder = UnknownFieldSetBuilder::new();
  assert_matches!(
    builder.merge_varint_field(0, 1),
    Err(Error::ZeroFieldNumber)
  );
  assert_matches!(
    builder.add_field(0, UnknownField::new()),
    Err(Error::ZeroFieldNumber)
  );
  assert!(builder.build().is_empty());
}

#[test]
fn merge_from_appends() {
  let first = UnknownFieldSet::parse_from(&[0x08, 0x01]).unwrap();
  let second = UnknownFieldSet::parse_from(&[0x08, 0x02, 0x10, 0x03]).unwrap();

  let mut builder = first.to_builder();
  builder.merge_from(&second).unwrap();
  let merged = builder.build();
  assert_eq!(merged.get(1).varints(), &[1, 2]);
  assert_eq!(merged.get(2).varints(), &[3]);

  // The source set is untouched.
  assert_eq!(first.get(1).varints(), &[1]);
}

#[test]
fn clear() {
  let mut builder = UnknownFieldSet::parse_from(EVERY_WIRE_TYPE)
    .unwrap()
    .to_builder();
  builder.merge_varint_field(10, 1).unwrap();
  builder.clear();
  assert!(!builder.has_field(10));
  assert!(builder.build().is_empty());
}

#[test]
fn malformed_input() {
  // Truncated varint.
  let error = UnknownFieldSet::parse_from(&[0x08, 0x96]).unwrap_err();
  assert_eq!(error.kind(), ErrorKind::MalformedInput);

  // Stray end group tag.
  assert_matches!(
    UnknownFieldSet::parse_from(&[0x08, 0x01, 0x0c]),
    Err(Error::Wire(pb_wire::Error::InvalidEndTag))
  );

  // Group closed with the wrong number.
  assert_matches!(
    UnknownFieldSet::parse_from(&[0x23, 0x2c]),
    Err(Error::Wire(pb_wire::Error::InvalidEndTag))
  );
}

#[test]
fn message_set_encoding() {
  let mut builder = UnknownFieldSetBuilder::new();
  builder
    .merge_length_delimited_field(10, vec![0x08, 0x01])
    .unwrap()
    .merge_varint_field(11, 4)
    .unwrap();
  let set = builder.build();

  let size = set.serialized_size_as_message_set();
  let mut buffer = vec![0; size];
  let mut writer = CodedWriter::from_slice(&mut buffer);
  set.write_as_message_set_to(&mut writer).unwrap();
  writer.check_no_space_left().unwrap();

  assert_eq!(
    buffer,
    vec![
      0x0b, 0x10, 10, 0x1a, 0x02, 0x08, 0x01, 0x0c, // item for 10
      0x58, 0x04, // varint 11
    ]
  );
}
