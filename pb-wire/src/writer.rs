// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./writer_test.rs"]
mod writer_test;

use crate::options::WriterOptions;
use crate::tag::{WireType, make_tag, message_set};
use crate::varint::{MAX_SIZE, encode_varint32, encode_varint64, encode_zig_zag32, encode_zig_zag64};
use crate::{Error, Result};
use std::io::Write;

//
// WireMessage
//

/// Anything that can be embedded as a length-delimited or group field. The size reported by
/// [`WireMessage::serialized_size`] is written as the length prefix before
/// [`WireMessage::write_to`] runs, so the two must agree exactly.
pub trait WireMessage {
  fn serialized_size(&self) -> usize;

  fn write_to(&self, writer: &mut CodedWriter<'_>) -> Result<()>;
}

/// Serializes a message into a freshly allocated buffer of exactly its serialized size.
pub fn encode_to_vec<M: WireMessage + ?Sized>(message: &M) -> Result<Vec<u8>> {
  let mut buffer = vec![0; message.serialized_size()];
  let mut writer = CodedWriter::from_slice(&mut buffer);
  message.write_to(&mut writer)?;
  writer.check_no_space_left()?;
  Ok(buffer)
}

//
// Sink
//

enum Sink<'a> {
  Slice {
    buffer: &'a mut [u8],
    position: usize,
  },
  Stream {
    output: &'a mut dyn Write,
    buffer: Vec<u8>,
    capacity: usize,
    flushed: usize,
  },
}

//
// CodedWriter
//

/// Encodes tags and values in the protobuf binary wire format.
///
/// A slice-backed writer never writes past the end of its slice and fails with
/// [`Error::OutOfSpace`] instead. A stream-backed writer buffers internally and only writes to
/// the stream when the buffer fills or [`CodedWriter::flush`] is called. Callers must flush a
/// stream-backed writer before dropping it.
pub struct CodedWriter<'a> {
  sink: Sink<'a>,
}

impl<'a> CodedWriter<'a> {
  pub fn from_slice(buffer: &'a mut [u8]) -> Self {
    Self {
      sink: Sink::Slice {
        buffer,
        position: 0,
      },
    }
  }

  pub fn from_stream(output: &'a mut dyn Write) -> Self {
    Self::from_stream_with_options(output, &WriterOptions::default())
  }

  pub fn from_stream_with_options(output: &'a mut dyn Write, options: &WriterOptions) -> Self {
    let capacity = options.buffer_size.max(1);
    Self {
      sink: Sink::Stream {
        output,
        buffer: Vec::with_capacity(capacity),
        capacity,
        flushed: 0,
      },
    }
  }

  /// Total number of bytes written so far, including bytes still buffered.
  #[must_use]
  pub fn position(&self) -> usize {
    match &self.sink {
      Sink::Slice { position, .. } => *position,
      Sink::Stream {
        buffer, flushed, ..
      } => flushed + buffer.len(),
    }
  }

  /// Remaining capacity of a slice-backed writer. Streams have no fixed capacity.
  #[must_use]
  pub fn space_left(&self) -> Option<usize> {
    match &self.sink {
      Sink::Slice { buffer, position } => Some(buffer.len() - position),
      Sink::Stream { .. } => None,
    }
  }

  /// Verifies that a slice-backed writer filled its slice exactly. Used after writing a message
  /// into a buffer sized by a prior size pass.
  pub fn check_no_space_left(&self) -> Result<()> {
    match self.space_left() {
      Some(0) | None => Ok(()),
      Some(left) => Err(Error::SpaceLeftOver(left)),
    }
  }

  pub fn flush(&mut self) -> Result<()> {
    match &mut self.sink {
      Sink::Slice { .. } => Ok(()),
      Sink::Stream {
        output,
        buffer,
        flushed,
        ..
      } => {
        Self::flush_buffer(&mut **output, buffer, flushed)?;
        output.flush()?;
        Ok(())
      },
    }
  }

  fn flush_buffer(output: &mut dyn Write, buffer: &mut Vec<u8>, flushed: &mut usize) -> Result<()> {
    if buffer.is_empty() {
      return Ok(());
    }

    log::trace!("flushing {} buffered bytes", buffer.len());
    output.write_all(buffer)?;
    *flushed += buffer.len();
    buffer.clear();
    Ok(())
  }

  //
  // Raw writes
  //

  pub fn write_raw_bytes(&mut self, bytes: &[u8]) -> Result<()> {
    match &mut self.sink {
      Sink::Slice { buffer, position } => {
        let end = position
          .checked_add(bytes.len())
          .filter(|end| *end <= buffer.len())
          .ok_or(Error::OutOfSpace)?;
        buffer[*position .. end].copy_from_slice(bytes);
        *position = end;
        Ok(())
      },
      Sink::Stream {
        output,
        buffer,
        capacity,
        flushed,
      } => {
        let room = *capacity - buffer.len();
        if bytes.len() <= room {
          buffer.extend_from_slice(bytes);
          return Ok(());
        }

        // Top off the buffer, flush it, then either buffer the tail or hand it straight to the
        // stream if it would not fit anyway.
        let (head, tail) = bytes.split_at(room);
        buffer.extend_from_slice(head);
        Self::flush_buffer(&mut **output, buffer, flushed)?;
        if tail.len() <= *capacity {
          buffer.extend_from_slice(tail);
        } else {
          output.write_all(tail)?;
          *flushed += tail.len();
        }
        Ok(())
      },
    }
  }

  pub fn write_raw_byte(&mut self, value: u8) -> Result<()> {
    self.write_raw_bytes(&[value])
  }

  pub fn write_raw_varint32(&mut self, value: u32) -> Result<()> {
    let mut scratch = [0u8; MAX_SIZE];
    let len = encode_varint32(value, &mut scratch.as_mut_slice());
    self.write_raw_bytes(&scratch[.. len])
  }

  pub fn write_raw_varint64(&mut self, value: u64) -> Result<()> {
    let mut scratch = [0u8; MAX_SIZE];
    let len = encode_varint64(value, &mut scratch.as_mut_slice());
    self.write_raw_bytes(&scratch[.. len])
  }

  pub fn write_raw_little_endian32(&mut self, value: u32) -> Result<()> {
    self.write_raw_bytes(&value.to_le_bytes())
  }

  pub fn write_raw_little_endian64(&mut self, value: u64) -> Result<()> {
    self.write_raw_bytes(&value.to_le_bytes())
  }

  pub fn write_tag(&mut self, field_number: u32, wire_type: WireType) -> Result<()> {
    self.write_raw_varint32(make_tag(field_number, wire_type))
  }

  /// Writes the varint length prefix of a length-delimited value.
  pub fn write_length(&mut self, len: usize) -> Result<()> {
    self.write_raw_varint64(len as u64)
  }

  //
  // Values without a tag
  //

  pub fn write_int32_no_tag(&mut self, value: i32) -> Result<()> {
    if value >= 0 {
      #[allow(clippy::cast_sign_loss)]
      let value = value as u32;
      self.write_raw_varint32(value)
    } else {
      #[allow(clippy::cast_sign_loss)]
      let value = i64::from(value) as u64;
      self.write_raw_varint64(value)
    }
  }

  pub fn write_int64_no_tag(&mut self, value: i64) -> Result<()> {
    #[allow(clippy::cast_sign_loss)]
    let value = value as u64;
    self.write_raw_varint64(value)
  }

  pub fn write_uint32_no_tag(&mut self, value: u32) -> Result<()> {
    self.write_raw_varint32(value)
  }

  pub fn write_uint64_no_tag(&mut self, value: u64) -> Result<()> {
    self.write_raw_varint64(value)
  }

  pub fn write_sint32_no_tag(&mut self, value: i32) -> Result<()> {
    self.write_raw_varint32(encode_zig_zag32(value))
  }

  pub fn write_sint64_no_tag(&mut self, value: i64) -> Result<()> {
    self.write_raw_varint64(encode_zig_zag64(value))
  }

  pub fn write_fixed32_no_tag(&mut self, value: u32) -> Result<()> {
    self.write_raw_little_endian32(value)
  }

  pub fn write_fixed64_no_tag(&mut self, value: u64) -> Result<()> {
    self.write_raw_little_endian64(value)
  }

  pub fn write_sfixed32_no_tag(&mut self, value: i32) -> Result<()> {
    #[allow(clippy::cast_sign_loss)]
    let value = value as u32;
    self.write_raw_little_endian32(value)
  }

  pub fn write_sfixed64_no_tag(&mut self, value: i64) -> Result<()> {
    #[allow(clippy::cast_sign_loss)]
    let value = value as u64;
    self.write_raw_little_endian64(value)
  }

  pub fn write_float_no_tag(&mut self, value: f32) -> Result<()> {
    self.write_raw_little_endian32(value.to_bits())
  }

  pub fn write_double_no_tag(&mut self, value: f64) -> Result<()> {
    self.write_raw_little_endian64(value.to_bits())
  }

  pub fn write_bool_no_tag(&mut self, value: bool) -> Result<()> {
    self.write_raw_byte(u8::from(value))
  }

  pub fn write_enum_no_tag(&mut self, value: i32) -> Result<()> {
    self.write_int32_no_tag(value)
  }

  pub fn write_string_no_tag(&mut self, value: &str) -> Result<()> {
    self.write_bytes_no_tag(value.as_bytes())
  }

  pub fn write_bytes_no_tag(&mut self, value: &[u8]) -> Result<()> {
    self.write_length(value.len())?;
    self.write_raw_bytes(value)
  }

  pub fn write_message_no_tag<M: WireMessage + ?Sized>(&mut self, message: &M) -> Result<()> {
    self.write_length(message.serialized_size())?;
    message.write_to(self)
  }

  //
  // Values with a tag
  //

  pub fn write_int32(&mut self, field_number: u32, value: i32) -> Result<()> {
    self.write_tag(field_number, WireType::Varint)?;
    self.write_int32_no_tag(value)
  }

  pub fn write_int64(&mut self, field_number: u32, value: i64) -> Result<()> {
    self.write_tag(field_number, WireType::Varint)?;
    self.write_int64_no_tag(value)
  }

  pub fn write_uint32(&mut self, field_number: u32, value: u32) -> Result<()> {
    self.write_tag(field_number, WireType::Varint)?;
    self.write_uint32_no_tag(value)
  }

  pub fn write_uint64(&mut self, field_number: u32, value: u64) -> Result<()> {
    self.write_tag(field_number, WireType::Varint)?;
    self.write_uint64_no_tag(value)
  }

  pub fn write_sint32(&mut self, field_number: u32, value: i32) -> Result<()> {
    self.write_tag(field_number, WireType::Varint)?;
    self.write_sint32_no_tag(value)
  }

  pub fn write_sint64(&mut self, field_number: u32, value: i64) -> Result<()> {
    self.write_tag(field_number, WireType::Varint)?;
    self.write_sint64_no_tag(value)
  }

  pub fn write_fixed32(&mut self, field_number: u32, value: u32) -> Result<()> {
    self.write_tag(field_number, WireType::Fixed32)?;
    self.write_fixed32_no_tag(value)
  }

  pub fn write_fixed64(&mut self, field_number: u32, value: u64) -> Result<()> {
    self.write_tag(field_number, WireType::Fixed64)?;
    self.write_fixed64_no_tag(value)
  }

  pub fn write_sfixed32(&mut self, field_number: u32, value: i32) -> Result<()> {
    self.write_tag(field_number, WireType::Fixed32)?;
    self.write_sfixed32_no_tag(value)
  }

  pub fn write_sfixed64(&mut self, field_number: u32, value: i64) -> Result<()> {
    self.write_tag(field_number, WireType::Fixed64)?;
    self.write_sfixed64_no_tag(value)
  }

  pub fn write_float(&mut self, field_number: u32, value: f32) -> Result<()> {
    self.write_tag(field_number, WireType::Fixed32)?;
    self.write_float_no_tag(value)
  }

  pub fn write_double(&mut self, field_number: u32, value: f64) -> Result<()> {
    self.write_tag(field_number, WireType::Fixed64)?;
    self.write_double_no_tag(value)
  }

  pub fn write_bool(&mut self, field_number: u32, value: bool) -> Result<()> {
    self.write_tag(field_number, WireType::Varint)?;
    self.write_bool_no_tag(value)
  }

  pub fn write_enum(&mut self, field_number: u32, value: i32) -> Result<()> {
    self.write_tag(field_number, WireType::Varint)?;
    self.write_enum_no_tag(value)
  }

  pub fn write_string(&mut self, field_number: u32, value: &str) -> Result<()> {
    self.write_tag(field_number, WireType::LengthDelimited)?;
    self.write_string_no_tag(value)
  }

  pub fn write_bytes(&mut self, field_number: u32, value: &[u8]) -> Result<()> {
    self.write_tag(field_number, WireType::LengthDelimited)?;
    self.write_bytes_no_tag(value)
  }

  pub fn write_message<M: WireMessage + ?Sized>(
    &mut self,
    field_number: u32,
    message: &M,
  ) -> Result<()> {
    self.write_tag(field_number, WireType::LengthDelimited)?;
    self.write_message_no_tag(message)
  }

  pub fn write_group<M: WireMessage + ?Sized>(&mut self, field_number: u32, message: &M) -> Result<()> {
    self.write_tag(field_number, WireType::StartGroup)?;
    message.write_to(self)?;
    self.write_tag(field_number, WireType::EndGroup)
  }

  /// Writes `message` as a MessageSet item for the extension numbered `field_number`.
  pub fn write_message_set_extension<M: WireMessage + ?Sized>(
    &mut self,
    field_number: u32,
    message: &M,
  ) -> Result<()> {
    self.write_raw_varint32(message_set::ITEM_TAG)?;
    self.write_uint32(message_set::TYPE_ID, field_number)?;
    self.write_message(message_set::MESSAGE, message)?;
    self.write_raw_varint32(message_set::ITEM_END_TAG)
  }

  /// Writes an already serialized message body as a MessageSet item.
  pub fn write_raw_message_set_extension(&mut self, field_number: u32, body: &[u8]) -> Result<()> {
    self.write_raw_varint32(message_set::ITEM_TAG)?;
    self.write_uint32(message_set::TYPE_ID, field_number)?;
    self.write_bytes(message_set::MESSAGE, body)?;
    self.write_raw_varint32(message_set::ITEM_END_TAG)
  }
}
