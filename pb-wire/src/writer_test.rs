// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#![allow(clippy::unwrap_used)]

use super::*;
use crate::size;
use assert_matches::assert_matches;
use rstest::rstest;

#[ctor::ctor]
fn test_global_init() {
  pb_test_helpers::test_global_init();
}

struct Pair {
  id: u32,
  name: String,
}

impl WireMessage for Pair {
  fn serialized_size(&self) -> usize {
    size::uint32_size(1, self.id) + size::string_size(2, &self.name)
  }

  fn write_to(&self, writer: &mut CodedWriter<'_>) -> Result<()> {
    writer.write_uint32(1, self.id)?;
    writer.write_string(2, &self.name)
  }
}

fn write_to_vec(f: impl FnOnce(&mut CodedWriter<'_>) -> Result<()>) -> Vec<u8> {
  let mut output: Vec<u8> = Vec::new();
  let mut writer = CodedWriter::from_stream(&mut output);
  f(&mut writer).unwrap();
  writer.flush().unwrap();
  drop(writer);
  output
}

#[test]
fn known_encodings() {
  assert_eq!(
    write_to_vec(|w| w.write_uint32(1, 150)),
    vec![0x08, 0x96, 0x01]
  );
  assert_eq!(
    write_to_vec(|w| w.write_string(2, "testing")),
    vec![0x12, 0x07, b't', b'e', b's', b't', b'i', b'n', b'g']
  );
  assert_eq!(
    write_to_vec(|w| w.write_sint32(3, -1)),
    vec![0x18, 0x01]
  );
  assert_eq!(
    write_to_vec(|w| w.write_fixed32(4, 1)),
    vec![0x25, 0x01, 0x00, 0x00, 0x00]
  );
  assert_eq!(
    write_to_vec(|w| w.write_double(5, 1.0)),
    vec![0x29, 0, 0, 0, 0, 0, 0, 0xF0, 0x3F]
  );
  assert_eq!(write_to_vec(|w| w.write_bool(6, true)), vec![0x30, 0x01]);
}

#[test]
fn negative_int32_is_sign_extended() {
  let bytes = write_to_vec(|w| w.write_int32(1, -1));
  assert_eq!(bytes.len(), 11);
  assert_eq!(bytes.len(), size::int32_size(1, -1));
  assert_eq!(&bytes[1 ..], &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);

  let bytes = write_to_vec(|w| w.write_enum(1, -2));
  assert_eq!(bytes.len(), size::enum_size(1, -2));
}

#[rstest]
#[case(1, 0)]
#[case(15, i32::MAX)]
#[case(16, i32::MIN)]
#[case(2047, -64)]
#[case(2048, 64)]
#[case(crate::tag::MAX_FIELD_NUMBER, 1)]
fn scalar_sizes_match_written_bytes(#[case] number: u32, #[case] value: i32) {
  let wide = i64::from(value) * 3;
  #[allow(clippy::cast_sign_loss)]
  let unsigned = value as u32;

  let cases: Vec<(usize, Vec<u8>)> = vec![
    (size::int32_size(number, value), write_to_vec(|w| w.write_int32(number, value))),
    (size::int64_size(number, wide), write_to_vec(|w| w.write_int64(number, wide))),
    (size::uint32_size(number, unsigned), write_to_vec(|w| w.write_uint32(number, unsigned))),
    (
      size::uint64_size(number, u64::from(unsigned) << 20),
      write_to_vec(|w| w.write_uint64(number, u64::from(unsigned) << 20)),
    ),
    (size::sint32_size(number, value), write_to_vec(|w| w.write_sint32(number, value))),
    (size::sint64_size(number, wide), write_to_vec(|w| w.write_sint64(number, wide))),
    (size::fixed32_size(number), write_to_vec(|w| w.write_sfixed32(number, value))),
    (size::fixed64_size(number), write_to_vec(|w| w.write_sfixed64(number, wide))),
    (size::fixed32_size(number), write_to_vec(|w| w.write_float(number, 1.5))),
    (size::fixed64_size(number), write_to_vec(|w| w.write_double(number, -2.5))),
    (size::bool_size(number), write_to_vec(|w| w.write_bool(number, false))),
    (size::enum_size(number, value), write_to_vec(|w| w.write_enum(number, value))),
    (size::string_size(number, "hello"), write_to_vec(|w| w.write_string(number, "hello"))),
    (size::bytes_size(number, &[0; 200]), write_to_vec(|w| w.write_bytes(number, &[0; 200]))),
  ];

  for (i, (predicted, bytes)) in cases.into_iter().enumerate() {
    assert_eq!(predicted, bytes.len(), "case {i}");
  }
}

#[test]
fn embedded_message_group_and_message_set() {
  let pair = Pair {
    id: 7,
    name: "seven".to_string(),
  };

  let bytes = write_to_vec(|w| w.write_message(3, &pair));
  assert_eq!(bytes.len(), size::message_size(3, pair.serialized_size()));
  assert_eq!(bytes[0], 0x1A);
  assert_eq!(usize::from(bytes[1]), pair.serialized_size());

  let bytes = write_to_vec(|w| w.write_group(3, &pair));
  assert_eq!(bytes.len(), size::group_size(3, pair.serialized_size()));
  assert_eq!(bytes[0], 0x1B);
  assert_eq!(bytes[bytes.len() - 1], 0x1C);

  let bytes = write_to_vec(|w| w.write_message_set_extension(1000, &pair));
  assert_eq!(
    bytes.len(),
    size::message_set_extension_size(1000, pair.serialized_size())
  );
  assert_eq!(bytes[0], 0x0B);
  assert_eq!(bytes[1], 0x10);
  assert_eq!(bytes[bytes.len() - 1], 0x0C);

  let body = encode_to_vec(&pair).unwrap();
  let raw = write_to_vec(|w| w.write_raw_message_set_extension(1000, &body));
  assert_eq!(raw, bytes);
}

#[test]
fn slice_overflow_is_out_of_space() {
  let mut buffer = [0u8; 3];
  let mut writer = CodedWriter::from_slice(&mut buffer);
  writer.write_uint32(1, 1).unwrap();
  assert_eq!(writer.space_left(), Some(1));
  assert_eq!(writer.position(), 2);

  assert_matches!(writer.write_raw_bytes(&[1, 2]), Err(Error::OutOfSpace));
  // A failed raw write leaves no partial data behind.
  assert_eq!(writer.position(), 2);

  // The tag still fits, the value does not.
  assert_matches!(writer.write_fixed32(2, 5), Err(Error::OutOfSpace));
  assert_eq!(writer.position(), 3);
  assert_eq!(writer.space_left(), Some(0));
  writer.check_no_space_left().unwrap();
}

#[test]
fn slice_space_left_over() {
  let mut buffer = [0u8; 8];
  let mut writer = CodedWriter::from_slice(&mut buffer);
  writer.write_bool(1, true).unwrap();
  assert_matches!(writer.check_no_space_left(), Err(Error::SpaceLeftOver(6)));
}

#[test]
fn encode_to_vec_is_exact() {
  let pair = Pair {
    id: 300,
    name: "x".repeat(200),
  };
  let bytes = encode_to_vec(&pair).unwrap();
  assert_eq!(bytes.len(), pair.serialized_size());
  assert_eq!(&bytes[.. 3], &[0x08, 0xAC, 0x02]);
}

#[test]
fn stream_flushes_only_when_full() {
  let mut output: Vec<u8> = Vec::new();
  {
    let mut writer =
      CodedWriter::from_stream_with_options(&mut output, &WriterOptions::default().with_buffer_size(4));
    writer.write_raw_bytes(&[1, 2, 3]).unwrap();
    assert_eq!(writer.position(), 3);
    assert_eq!(writer.space_left(), None);
    writer.write_raw_bytes(&[4, 5]).unwrap();
    writer.write_raw_bytes(&[6, 7, 8, 9, 10, 11, 12]).unwrap();
    assert_eq!(writer.position(), 12);
    writer.flush().unwrap();
  }
  assert_eq!(output, (1 ..= 12).collect::<Vec<u8>>());
}

#[test]
fn stream_buffers_until_flush() {
  let mut output: Vec<u8> = Vec::new();
  let mut writer = CodedWriter::from_stream(&mut output);
  writer.write_string(1, "buffered").unwrap();
  drop(writer);
  assert!(output.is_empty());
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(7)]
#[case(4096)]
fn tiny_stream_buffer_matches_slice(#[case] buffer_size: usize) {
  let pair = Pair {
    id: u32::MAX,
    name: "a somewhat longer name that spans several buffers".to_string(),
  };

  let mut expected = vec![0; size::message_size(1, pair.serialized_size()) + 2 * 11];
  {
    let mut writer = CodedWriter::from_slice(&mut expected);
    writer.write_message(1, &pair).unwrap();
    writer.write_int64(2, -5).unwrap();
    writer.write_int32(3, i32::MIN).unwrap();
    writer.check_no_space_left().unwrap();
  }

  let mut output: Vec<u8> = Vec::new();
  {
    let mut writer = CodedWriter::from_stream_with_options(
      &mut output,
      &WriterOptions::default().with_buffer_size(buffer_size),
    );
    writer.write_message(1, &pair).unwrap();
    writer.write_int64(2, -5).unwrap();
    writer.write_int32(3, i32::MIN).unwrap();
    writer.flush().unwrap();
  }

  assert_eq!(output, expected);
}
