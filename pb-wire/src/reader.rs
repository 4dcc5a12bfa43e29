// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./reader_test.rs"]
mod reader_test;

use crate::options::ReaderOptions;
use crate::tag::{WireType, make_tag, tag_field_number};
use crate::varint::{self, MAX_SIZE, decode_zig_zag32, decode_zig_zag64};
use crate::{Error, Result};
use bytes::Bytes;
use std::borrow::Cow;
use std::io::Read;

const NO_LIMIT: usize = usize::MAX;

enum Source<'a> {
  Slice,
  Stream(&'a mut dyn Read),
}

/// Decodes tags and values in the protobuf binary wire format from a slice or a buffered stream.
///
/// The reader tracks a stack of byte limits (one per enclosing length-delimited message), the
/// current nesting depth, and the total number of bytes consumed. Exceeding the configured
/// recursion or size limit fails immediately rather than after the data has been read.
pub struct CodedReader<'a> {
  source: Source<'a>,
  // For a slice source this is the whole input. For a stream it is the refill buffer.
  buffer: Cow<'a, [u8]>,
  // Number of readable bytes in `buffer`, clamped to the current limit.
  buffer_size: usize,
  // Bytes in `buffer` that lie beyond the current limit.
  buffer_size_after_limit: usize,
  buffer_pos: usize,
  // Absolute position of the start of `buffer`.
  total_bytes_retired: usize,
  // Absolute position that reads may not cross.
  current_limit: usize,
  recursion_depth: u32,
  last_tag: u32,
  // Absolute position at which the size counter was last reset.
  size_counter_base: usize,
  options: ReaderOptions,
}

impl<'a> CodedReader<'a> {
  #[must_use]
  pub fn from_slice(input: &'a [u8]) -> Self {
    Self::from_slice_with_options(input, ReaderOptions::default())
  }

  #[must_use]
  pub fn from_slice_with_options(input: &'a [u8], options: ReaderOptions) -> Self {
    Self {
      source: Source::Slice,
      buffer_size: input.len(),
      buffer: Cow::Borrowed(input),
      buffer_size_after_limit: 0,
      buffer_pos: 0,
      total_bytes_retired: 0,
      current_limit: NO_LIMIT,
      recursion_depth: 0,
      last_tag: 0,
      size_counter_base: 0,
      options,
    }
  }

  pub fn from_stream(input: &'a mut dyn Read) -> Self {
    Self::from_stream_with_options(input, ReaderOptions::default())
  }

  pub fn from_stream_with_options(input: &'a mut dyn Read, options: ReaderOptions) -> Self {
    Self {
      source: Source::Stream(input),
      buffer: Cow::Owned(vec![0; options.buffer_size.max(1)]),
      buffer_size: 0,
      buffer_size_after_limit: 0,
      buffer_pos: 0,
      total_bytes_retired: 0,
      current_limit: NO_LIMIT,
      recursion_depth: 0,
      last_tag: 0,
      size_counter_base: 0,
      options,
    }
  }

  #[must_use]
  pub const fn options(&self) -> &ReaderOptions {
    &self.options
  }

  /// Sets the maximum nesting depth, returning the previous limit.
  pub const fn set_recursion_limit(&mut self, limit: u32) -> u32 {
    let old = self.options.recursion_limit;
    self.options.recursion_limit = limit;
    old
  }

  /// Sets the maximum number of bytes that may be consumed, returning the previous limit.
  pub const fn set_size_limit(&mut self, limit: usize) -> usize {
    let old = self.options.size_limit;
    self.options.size_limit = limit;
    old
  }

  /// Restarts the size counter at the current position so that several messages can be read
  /// from one stream without tripping the size limit.
  pub const fn reset_size_counter(&mut self) {
    self.size_counter_base = self.position();
  }

  /// Number of bytes consumed since the reader was created.
  #[must_use]
  pub const fn position(&self) -> usize {
    self.total_bytes_retired + self.buffer_pos
  }

  #[must_use]
  pub const fn recursion_depth(&self) -> u32 {
    self.recursion_depth
  }

  #[must_use]
  pub const fn last_tag(&self) -> u32 {
    self.last_tag
  }

  /// Bytes left before the innermost pushed limit, or `None` if no limit is active.
  #[must_use]
  pub const fn bytes_until_limit(&self) -> Option<usize> {
    if self.current_limit == NO_LIMIT {
      None
    } else {
      Some(self.current_limit - self.position())
    }
  }

  /// True once the input or the innermost limit has been exhausted.
  pub fn is_at_end(&mut self) -> Result<bool> {
    Ok(self.buffer_pos == self.buffer_size && !self.refill_buffer(false)?)
  }

  //
  // Limits
  //

  /// Restricts reads to the next `byte_limit` bytes. Returns the previous limit, which must be
  /// handed back to [`CodedReader::pop_limit`].
  pub fn push_limit(&mut self, byte_limit: usize) -> Result<usize> {
    self.check_size_limit(byte_limit)?;
    let limit = self
      .position()
      .checked_add(byte_limit)
      .ok_or(Error::TruncatedMessage)?;
    let old_limit = self.current_limit;
    if limit > old_limit {
      return Err(Error::TruncatedMessage);
    }

    self.current_limit = limit;
    self.recompute_buffer_size_after_limit();
    Ok(old_limit)
  }

  pub fn pop_limit(&mut self, old_limit: usize) {
    self.current_limit = old_limit;
    self.recompute_buffer_size_after_limit();
  }

  const fn recompute_buffer_size_after_limit(&mut self) {
    self.buffer_size += self.buffer_size_after_limit;
    let buffer_end = self.total_bytes_retired + self.buffer_size;
    if buffer_end > self.current_limit {
      self.buffer_size_after_limit = buffer_end - self.current_limit;
      self.buffer_size -= self.buffer_size_after_limit;
    } else {
      self.buffer_size_after_limit = 0;
    }
  }

  fn check_size_limit(&self, additional: usize) -> Result<()> {
    let consumed = self.position() - self.size_counter_base;
    if consumed.saturating_add(additional) > self.options.size_limit {
      log::debug!(
        "size limit of {} bytes exceeded at position {}",
        self.options.size_limit,
        self.position()
      );
      return Err(Error::SizeLimitExceeded(self.options.size_limit));
    }
    Ok(())
  }

  fn check_recursion_limit(&self) -> Result<()> {
    if self.recursion_depth >= self.options.recursion_limit {
      log::debug!(
        "recursion limit of {} exceeded at position {}",
        self.options.recursion_limit,
        self.position()
      );
      return Err(Error::RecursionLimitExceeded(self.options.recursion_limit));
    }
    Ok(())
  }

  //
  // Buffer management
  //

  // Only called once the buffer is exhausted. Returns false (or fails with TruncatedMessage if
  // `must_succeed`) when the input or the current limit has been reached.
  //
  // A stream refill reads no further than the size limit allows. Once the limit is reached an end
  // of input check still reads one byte, which the next size check then rejects.
  fn refill_buffer(&mut self, must_succeed: bool) -> Result<bool> {
    debug_assert_eq!(self.buffer_pos, self.buffer_size);

    if self.total_bytes_retired + self.buffer_size == self.current_limit {
      return if must_succeed {
        Err(Error::TruncatedMessage)
      } else {
        Ok(false)
      };
    }

    self.total_bytes_retired += self.buffer_size;
    self.buffer_pos = 0;
    self.buffer_size = 0;

    let consumed = self.total_bytes_retired - self.size_counter_base;
    let allowed = self.options.size_limit.saturating_sub(consumed);
    if allowed == 0 && must_succeed && matches!(self.source, Source::Stream(_)) {
      log::debug!(
        "size limit of {} bytes exceeded while refilling at position {}",
        self.options.size_limit,
        self.total_bytes_retired
      );
      return Err(Error::SizeLimitExceeded(self.options.size_limit));
    }
    let read_len = self.buffer.len().min(allowed.max(1));

    self.buffer_size = match &mut self.source {
      Source::Slice => 0,
      Source::Stream(input) => {
        read_retrying(&mut **input, &mut self.buffer.to_mut()[.. read_len])?
      },
    };

    if self.buffer_size == 0 {
      return if must_succeed {
        Err(Error::TruncatedMessage)
      } else {
        Ok(false)
      };
    }

    self.recompute_buffer_size_after_limit();
    Ok(true)
  }

  //
  // Raw reads
  //

  pub fn read_raw_byte(&mut self) -> Result<u8> {
    if self.buffer_pos == self.buffer_size {
      self.refill_buffer(true)?;
    }
    let byte = self.buffer[self.buffer_pos];
    self.buffer_pos += 1;
    Ok(byte)
  }

  /// Reads exactly `size` bytes.
  pub fn read_raw_bytes(&mut self, size: usize) -> Result<Vec<u8>> {
    self.check_size_limit(size)?;
    if self.position().saturating_add(size) > self.current_limit {
      // Consume up to the limit so the reader is left in a consistent state, then fail.
      self.skip_raw_bytes(self.current_limit - self.position())?;
      return Err(Error::TruncatedMessage);
    }

    let available = self.buffer_size - self.buffer_pos;
    if size <= available {
      let bytes = self.buffer[self.buffer_pos .. self.buffer_pos + size].to_vec();
      self.buffer_pos += size;
      return Ok(bytes);
    }

    // Grow as data actually arrives so a bogus length cannot force a large allocation.
    let mut bytes = Vec::with_capacity(available.max(self.buffer.len()).min(size));
    let mut remaining = size;
    loop {
      let take = (self.buffer_size - self.buffer_pos).min(remaining);
      bytes.extend_from_slice(&self.buffer[self.buffer_pos .. self.buffer_pos + take]);
      self.buffer_pos += take;
      remaining -= take;
      if remaining == 0 {
        return Ok(bytes);
      }
      self.refill_buffer(true)?;
    }
  }

  pub fn skip_raw_bytes(&mut self, size: usize) -> Result<()> {
    if self.position().saturating_add(size) > self.current_limit {
      let to_limit = self.current_limit - self.position();
      self.skip_raw_bytes(to_limit)?;
      return Err(Error::TruncatedMessage);
    }

    let mut remaining = size;
    loop {
      let take = (self.buffer_size - self.buffer_pos).min(remaining);
      self.buffer_pos += take;
      remaining -= take;
      if remaining == 0 {
        return Ok(());
      }
      self.refill_buffer(true)?;
    }
  }

  pub fn read_raw_varint64(&mut self) -> Result<u64> {
    let mut available = &self.buffer[self.buffer_pos .. self.buffer_size];
    let before = available.len();
    match varint::decode_varint64(&mut available) {
      Ok(value) => {
        self.buffer_pos += before - available.len();
        Ok(value)
      },
      // The varint straddles a buffer boundary.
      Err(Error::TruncatedMessage) => self.read_raw_varint64_slow(),
      Err(e) => Err(e),
    }
  }

  fn read_raw_varint64_slow(&mut self) -> Result<u64> {
    let mut result = 0u64;
    for i in 0 .. MAX_SIZE {
      let byte = self.read_raw_byte()?;
      result |= u64::from(byte & 0x7F) << (7 * i);
      if byte < 0x80 {
        return Ok(result);
      }
    }
    Err(Error::MalformedVarint)
  }

  /// Reads a varint and keeps its low 32 bits. Sign extended negative int32 values occupy the
  /// full 10 bytes and are consumed entirely.
  #[allow(clippy::cast_possible_truncation)]
  pub fn read_raw_varint32(&mut self) -> Result<u32> {
    self.read_raw_varint64().map(|value| value as u32)
  }

  pub fn read_raw_little_endian32(&mut self) -> Result<u32> {
    let mut bytes = [0u8; 4];
    self.read_raw_array(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
  }

  pub fn read_raw_little_endian64(&mut self) -> Result<u64> {
    let mut bytes = [0u8; 8];
    self.read_raw_array(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
  }

  fn read_raw_array(&mut self, out: &mut [u8]) -> Result<()> {
    if self.buffer_size - self.buffer_pos >= out.len() {
      out.copy_from_slice(&self.buffer[self.buffer_pos .. self.buffer_pos + out.len()]);
      self.buffer_pos += out.len();
      return Ok(());
    }
    for byte in out.iter_mut() {
      *byte = self.read_raw_byte()?;
    }
    Ok(())
  }

  //
  // Tags
  //

  /// Reads the next field tag. Returns 0 at the end of the input or the current limit, which is
  /// never a valid tag.
  pub fn read_tag(&mut self) -> Result<u32> {
    if self.is_at_end()? {
      self.last_tag = 0;
      return Ok(0);
    }
    self.check_size_limit(0)?;

    let tag = self.read_raw_varint32()?;
    if tag_field_number(tag) == 0 {
      return Err(Error::InvalidTag);
    }
    WireType::try_from(tag)?;
    self.last_tag = tag;
    Ok(tag)
  }

  /// Verifies that the most recent [`CodedReader::read_tag`] returned `value`. Used to confirm
  /// that a message body ended at its limit or that a group ended with the matching end tag.
  pub const fn check_last_tag_was(&self, value: u32) -> Result<()> {
    if self.last_tag == value {
      Ok(())
    } else {
      Err(Error::InvalidEndTag)
    }
  }

  /// Skips the field whose tag was just read. Returns false if the tag is an end-group tag, which
  /// tells the caller to stop reading the current group.
  pub fn skip_field(&mut self, tag: u32) -> Result<bool> {
    match WireType::try_from(tag)? {
      WireType::Varint => {
        self.read_raw_varint64()?;
      },
      WireType::Fixed64 => self.skip_raw_bytes(8)?,
      WireType::LengthDelimited => {
        let len = self.read_length()?;
        self.skip_raw_bytes(len)?;
      },
      WireType::StartGroup => {
        self.check_recursion_limit()?;
        self.recursion_depth += 1;
        let result = self.skip_message();
        self.recursion_depth -= 1;
        result?;
        self.check_last_tag_was(make_tag(tag_field_number(tag), WireType::EndGroup))?;
      },
      WireType::EndGroup => return Ok(false),
      WireType::Fixed32 => self.skip_raw_bytes(4)?,
    }
    Ok(true)
  }

  /// Skips fields until the end of the input, the current limit, or an end-group tag.
  pub fn skip_message(&mut self) -> Result<()> {
    loop {
      let tag = self.read_tag()?;
      if tag == 0 || !self.skip_field(tag)? {
        return Ok(());
      }
    }
  }

  //
  // Values
  //

  /// Reads the varint length prefix of a length-delimited value.
  pub fn read_length(&mut self) -> Result<usize> {
    #[allow(clippy::cast_possible_wrap)]
    let len = self.read_raw_varint32()? as i32;
    usize::try_from(len).map_err(|_| Error::NegativeSize)
  }

  pub fn read_double(&mut self) -> Result<f64> {
    self.read_raw_little_endian64().map(f64::from_bits)
  }

  pub fn read_float(&mut self) -> Result<f32> {
    self.read_raw_little_endian32().map(f32::from_bits)
  }

  pub fn read_uint64(&mut self) -> Result<u64> {
    self.read_raw_varint64()
  }

  #[allow(clippy::cast_possible_wrap)]
  pub fn read_int64(&mut self) -> Result<i64> {
    self.read_raw_varint64().map(|value| value as i64)
  }

  #[allow(clippy::cast_possible_wrap)]
  pub fn read_int32(&mut self) -> Result<i32> {
    self.read_raw_varint32().map(|value| value as i32)
  }

  pub fn read_fixed64(&mut self) -> Result<u64> {
    self.read_raw_little_endian64()
  }

  pub fn read_fixed32(&mut self) -> Result<u32> {
    self.read_raw_little_endian32()
  }

  pub fn read_bool(&mut self) -> Result<bool> {
    self.read_raw_varint64().map(|value| value != 0)
  }

  pub fn read_string(&mut self) -> Result<String> {
    let len = self.read_length()?;
    let bytes = self.read_raw_bytes(len)?;
    String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
  }

  pub fn read_bytes(&mut self) -> Result<Bytes> {
    let len = self.read_length()?;
    self.read_raw_bytes(len).map(Bytes::from)
  }

  pub fn read_uint32(&mut self) -> Result<u32> {
    self.read_raw_varint32()
  }

  pub fn read_enum(&mut self) -> Result<i32> {
    self.read_int32()
  }

  #[allow(clippy::cast_possible_wrap)]
  pub fn read_sfixed32(&mut self) -> Result<i32> {
    self.read_raw_little_endian32().map(|value| value as i32)
  }

  #[allow(clippy::cast_possible_wrap)]
  pub fn read_sfixed64(&mut self) -> Result<i64> {
    self.read_raw_little_endian64().map(|value| value as i64)
  }

  pub fn read_sint32(&mut self) -> Result<i32> {
    self.read_raw_varint32().map(decode_zig_zag32)
  }

  pub fn read_sint64(&mut self) -> Result<i64> {
    self.read_raw_varint64().map(decode_zig_zag64)
  }

  //
  // Nested values
  //

  /// Reads a length-delimited embedded message. `parse_body` is run with the reader limited to
  /// the message's bytes and must consume fields until [`CodedReader::read_tag`] returns 0.
  pub fn read_message<T, E: From<Error>>(
    &mut self,
    parse_body: impl FnOnce(&mut Self) -> std::result::Result<T, E>,
  ) -> std::result::Result<T, E> {
    let len = self.read_length()?;
    self.check_recursion_limit()?;
    let old_limit = self.push_limit(len)?;

    self.recursion_depth += 1;
    let result = parse_body(self);
    self.recursion_depth -= 1;
    let value = result?;

    self.check_last_tag_was(0)?;
    self.pop_limit(old_limit);
    Ok(value)
  }

  /// Reads a group whose start tag has already been consumed. `parse_body` must stop at the
  /// end-group tag, which is then checked against `field_number`.
  pub fn read_group<T, E: From<Error>>(
    &mut self,
    field_number: u32,
    parse_body: impl FnOnce(&mut Self) -> std::result::Result<T, E>,
  ) -> std::result::Result<T, E> {
    self.check_recursion_limit()?;

    self.recursion_depth += 1;
    let result = parse_body(self);
    self.recursion_depth -= 1;
    let value = result?;

    self.check_last_tag_was(make_tag(field_number, WireType::EndGroup))?;
    Ok(value)
  }
}

fn read_retrying(input: &mut dyn Read, buffer: &mut [u8]) -> Result<usize> {
  loop {
    match input.read(buffer) {
      Ok(read) => return Ok(read),
      Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {},
      Err(e) => return Err(e.into()),
    }
  }
}
