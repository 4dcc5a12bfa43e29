// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./message_test.rs"]
mod message_test;

use crate::decode;
use crate::descriptor::{FieldDescriptor, MessageDescriptor};
use crate::extension::ExtensionRegistry;
use crate::field_set::FieldSet;
use crate::unknown::{UnknownFieldSet, UnknownFieldSetBuilder};
use crate::value::{FieldValue, Value};
use crate::{Error, Result, UninitializedMessageError};
use pb_wire::{CodedReader, CodedWriter, ReaderOptions, WireMessage};
use std::borrow::Cow;
use std::fmt;
use std::io::{Read, Write};
use std::sync::{Arc, OnceLock};

//
// MessageData
//

pub(crate) struct MessageData {
  fields: FieldSet,
  unknown_fields: UnknownFieldSet,
  cached_size: OnceLock<usize>,
}

impl MessageData {
  pub(crate) fn empty() -> Self {
    Self::new(FieldSet::new_immutable(), UnknownFieldSet::new())
  }

  fn new(fields: FieldSet, unknown_fields: UnknownFieldSet) -> Self {
    Self {
      fields,
      unknown_fields,
      cached_size: OnceLock::new(),
    }
  }
}

//
// Message
//

/// An immutable message. Cloning is cheap and clones share their data, so a message can be read
/// from many threads at once.
#[derive(Clone)]
pub struct Message {
  descriptor: MessageDescriptor,
  data: Arc<MessageData>,
}

static_assertions::assert_impl_all!(Message: Send, Sync);

impl PartialEq for Message {
  fn eq(&self, other: &Self) -> bool {
    self.descriptor == other.descriptor
      && (Arc::ptr_eq(&self.data, &other.data)
        || (self.data.fields == other.data.fields
          && self.data.unknown_fields == other.data.unknown_fields))
  }
}

impl fmt::Debug for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut debug = f.debug_struct(self.descriptor.full_name());
    for (field, value) in self.all_fields() {
      debug.field(field.name(), value);
    }
    if !self.data.unknown_fields.is_empty() {
      debug.field("unknown_fields", &self.data.unknown_fields);
    }
    debug.finish()
  }
}

impl Message {
  pub(crate) const fn from_parts(descriptor: MessageDescriptor, data: Arc<MessageData>) -> Self {
    Self { descriptor, data }
  }

  //
  // Parsing
  //

  /// Parses a complete message, failing if any required field is missing.
  pub fn parse_from(
    descriptor: &MessageDescriptor,
    bytes: &[u8],
    registry: &ExtensionRegistry,
  ) -> Result<Self> {
    Self::parse_from_with_options(descriptor, bytes, registry, ReaderOptions::default())
  }

  pub fn parse_from_with_options(
    descriptor: &MessageDescriptor,
    bytes: &[u8],
    registry: &ExtensionRegistry,
    options: ReaderOptions,
  ) -> Result<Self> {
    let mut reader = CodedReader::from_slice_with_options(bytes, options);
    Self::parse_from_reader(descriptor, &mut reader, registry)
  }

  /// Parses a message without checking required fields.
  pub fn parse_partial_from(
    descriptor: &MessageDescriptor,
    bytes: &[u8],
    registry: &ExtensionRegistry,
  ) -> Result<Self> {
    let mut builder = Builder::new(descriptor);
    builder.merge_from_bytes(bytes, registry)?;
    builder.build_partial()
  }

  /// Parses a message that extends to the end of `reader`.
  pub fn parse_from_reader(
    descriptor: &MessageDescriptor,
    reader: &mut CodedReader<'_>,
    registry: &ExtensionRegistry,
  ) -> Result<Self> {
    let mut builder = Builder::new(descriptor);
    builder.merge_from_reader(reader, registry)?;
    reader.check_last_tag_was(0)?;
    builder.build_parsed()
  }

  /// Reads one length prefixed message from `input`. Returns `None` if `input` is already at its
  /// end.
  pub fn parse_delimited_from(
    descriptor: &MessageDescriptor,
    input: &mut dyn Read,
    registry: &ExtensionRegistry,
  ) -> Result<Option<Self>> {
    let mut builder = Builder::new(descriptor);
    if !builder.merge_delimited_from(input, registry)? {
      return Ok(None);
    }
    builder.build_parsed().map(Some)
  }

  //
  // Accessors
  //

  #[must_use]
  pub const fn descriptor(&self) -> &MessageDescriptor {
    &self.descriptor
  }

  #[must_use]
  pub fn unknown_fields(&self) -> &UnknownFieldSet {
    &self.data.unknown_fields
  }

  /// Every set field, extensions included, ordered by field number.
  pub fn all_fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &FieldValue)> + '_ {
    self.data.fields.all_fields()
  }

  pub fn get_field(&self, field: &FieldDescriptor) -> Result<Cow<'_, FieldValue>> {
    check_containing_type(&self.descriptor, field)?;
    Ok(self.data.fields.get(field))
  }

  pub fn get_repeated_field(&self, field: &FieldDescriptor, index: usize) -> Result<&Value> {
    check_containing_type(&self.descriptor, field)?;
    self.data.fields.get_repeated(field, index)
  }

  pub fn has_field(&self, field: &FieldDescriptor) -> Result<bool> {
    check_containing_type(&self.descriptor, field)?;
    self.data.fields.has(field)
  }

  pub fn repeated_count(&self, field: &FieldDescriptor) -> Result<usize> {
    check_containing_type(&self.descriptor, field)?;
    self.data.fields.repeated_count(field)
  }

  pub fn get_extension(&self, extension: &FieldDescriptor) -> Result<Cow<'_, FieldValue>> {
    check_extension(&self.descriptor, extension)?;
    Ok(self.data.fields.get(extension))
  }

  pub fn has_extension(&self, extension: &FieldDescriptor) -> Result<bool> {
    check_extension(&self.descriptor, extension)?;
    self.data.fields.has(extension)
  }

  pub fn extension_count(&self, extension: &FieldDescriptor) -> Result<usize> {
    check_extension(&self.descriptor, extension)?;
    self.data.fields.repeated_count(extension)
  }

  /// Whether this message has no fields at all, which makes it equivalent to its type's default
  /// instance.
  #[must_use]
  pub fn is_default_instance(&self) -> bool {
    Arc::ptr_eq(
      &self.data,
      self
        .descriptor
        .schema()
        .default_instance_data(self.descriptor.id()),
    ) || (self.data.fields.is_empty() && self.data.unknown_fields.is_empty())
  }

  #[must_use]
  pub fn is_initialized(&self) -> bool {
    required_fields_present(&self.descriptor, &self.data.fields) && self.data.fields.is_initialized()
  }

  /// Paths of every missing required field, including those of embedded messages, e.g. `"a"`,
  /// `"b.c"` or `"d[2].e"`.
  #[must_use]
  pub fn missing_required_fields(&self) -> Vec<String> {
    let mut missing = Vec::new();
    collect_missing_fields(&self.descriptor, &self.data.fields, "", &mut missing);
    missing
  }

  #[must_use]
  pub fn to_builder(&self) -> Builder {
    Builder {
      descriptor: self.descriptor.clone(),
      state: Some(BuilderState {
        fields: self.data.fields.to_mutable(),
        unknown_fields: self.data.unknown_fields.to_builder(),
      }),
    }
  }

  //
  // Serialization
  //

  /// Encoded size, computed once and then cached.
  #[must_use]
  pub fn serialized_size(&self) -> usize {
    *self.data.cached_size.get_or_init(|| {
      let unknown_size = if self.descriptor.is_message_set_wire_format() {
        self.data.unknown_fields.serialized_size_as_message_set()
      } else {
        self.data.unknown_fields.serialized_size()
      };
      self.data.fields.serialized_size() + unknown_size
    })
  }

  /// Writes known fields in field number order followed by the unknown fields.
  pub fn write_to(&self, writer: &mut CodedWriter<'_>) -> pb_wire::Result<()> {
    self.data.fields.write_to(writer)?;
    if self.descriptor.is_message_set_wire_format() {
      self.data.unknown_fields.write_as_message_set_to(writer)
    } else {
      self.data.unknown_fields.write_to(writer)
    }
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>> {
    Ok(pb_wire::writer::encode_to_vec(self)?)
  }

  pub fn write_to_stream(&self, output: &mut dyn Write) -> Result<()> {
    let mut writer = CodedWriter::from_stream(output);
    self.write_to(&mut writer)?;
    writer.flush()?;
    Ok(())
  }

  /// Writes the message prefixed with its size as a varint.
  pub fn write_delimited_to(&self, output: &mut dyn Write) -> Result<()> {
    let mut writer = CodedWriter::from_stream(output);
    writer.write_length(self.serialized_size())?;
    self.write_to(&mut writer)?;
    writer.flush()?;
    Ok(())
  }
}

impl WireMessage for Message {
  fn serialized_size(&self) -> usize {
    Self::serialized_size(self)
  }

  fn write_to(&self, writer: &mut CodedWriter<'_>) -> pb_wire::Result<()> {
    Self::write_to(self, writer)
  }
}

fn check_containing_type(descriptor: &MessageDescriptor, field: &FieldDescriptor) -> Result<()> {
  if field.containing_type() != *descriptor {
    return Err(Error::WrongContainingType {
      field: field.full_name().to_string(),
      expected: descriptor.full_name().to_string(),
    });
  }
  Ok(())
}

fn check_extension(descriptor: &MessageDescriptor, extension: &FieldDescriptor) -> Result<()> {
  if !extension.is_extension() {
    return Err(Error::NotAnExtension(extension.full_name().to_string()));
  }
  check_containing_type(descriptor, extension)
}

fn required_fields_present(descriptor: &MessageDescriptor, fields: &FieldSet) -> bool {
  descriptor
    .fields()
    .filter(FieldDescriptor::is_required)
    .all(|field| fields.contains(field.number()))
}

fn collect_missing_fields(
  descriptor: &MessageDescriptor,
  fields: &FieldSet,
  prefix: &str,
  missing: &mut Vec<String>,
) {
  for field in descriptor.fields().filter(FieldDescriptor::is_required) {
    if !fields.contains(field.number()) {
      missing.push(format!("{prefix}{}", field.name()));
    }
  }

  for (field, value) in fields.all_fields() {
    let name = if field.is_extension() {
      format!("({})", field.full_name())
    } else {
      field.name().to_string()
    };
    match value {
      FieldValue::Single(Value::Message(message)) => collect_missing_fields(
        message.descriptor(),
        &message.data.fields,
        &format!("{prefix}{name}."),
        missing,
      ),
      FieldValue::Repeated(values) => {
        for (index, value) in values.iter().enumerate() {
          if let Value::Message(message) = value {
            collect_missing_fields(
              message.descriptor(),
              &message.data.fields,
              &format!("{prefix}{name}[{index}]."),
              missing,
            );
          }
        }
      },
      FieldValue::Single(_) => {},
    }
  }
}

//
// Builder
//

pub(crate) struct BuilderState {
  pub(crate) fields: FieldSet,
  pub(crate) unknown_fields: UnknownFieldSetBuilder,
}

/// Mutable construction of a [`Message`]. A builder produces exactly one message; once
/// [`Builder::build`] or [`Builder::build_partial`] succeeds every further call fails with
/// [`Error::AlreadyBuilt`].
pub struct Builder {
  descriptor: MessageDescriptor,
  state: Option<BuilderState>,
}

impl fmt::Debug for Builder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Builder")
      .field("descriptor", &self.descriptor)
      .field("built", &self.state.is_none())
      .finish()
  }
}

impl Builder {
  #[must_use]
  pub fn new(descriptor: &MessageDescriptor) -> Self {
    Self {
      descriptor: descriptor.clone(),
      state: Some(BuilderState {
        fields: FieldSet::new(),
        unknown_fields: UnknownFieldSetBuilder::new(),
      }),
    }
  }

  #[must_use]
  pub const fn descriptor(&self) -> &MessageDescriptor {
    &self.descriptor
  }

  fn state(&self) -> Result<&BuilderState> {
    self
      .state
      .as_ref()
      .ok_or_else(|| Error::AlreadyBuilt(self.descriptor.full_name().to_string()))
  }

  fn state_mut(&mut self) -> Result<&mut BuilderState> {
    match &mut self.state {
      Some(state) => Ok(state),
      None => Err(Error::AlreadyBuilt(self.descriptor.full_name().to_string())),
    }
  }

  fn field_state(&mut self, field: &FieldDescriptor) -> Result<&mut BuilderState> {
    check_containing_type(&self.descriptor, field)?;
    self.state_mut()
  }

  fn extension_state(&mut self, extension: &FieldDescriptor) -> Result<&mut BuilderState> {
    check_extension(&self.descriptor, extension)?;
    self.state_mut()
  }

  //
  // Fields
  //

  pub fn set_field(
    &mut self,
    field: &FieldDescriptor,
    value: impl Into<FieldValue>,
  ) -> Result<&mut Self> {
    self.field_state(field)?.fields.set(field, value.into())?;
    Ok(self)
  }

  pub fn set_repeated_field(
    &mut self,
    field: &FieldDescriptor,
    index: usize,
    value: impl Into<Value>,
  ) -> Result<&mut Self> {
    self
      .field_state(field)?
      .fields
      .set_repeated(field, index, value.into())?;
    Ok(self)
  }

  pub fn add_repeated_field(
    &mut self,
    field: &FieldDescriptor,
    value: impl Into<Value>,
  ) -> Result<&mut Self> {
    self
      .field_state(field)?
      .fields
      .add_repeated(field, value.into())?;
    Ok(self)
  }

  pub fn clear_field(&mut self, field: &FieldDescriptor) -> Result<&mut Self> {
    self.field_state(field)?.fields.clear(field)?;
    Ok(self)
  }

  /// Removes every field and unknown field.
  pub fn clear(&mut self) -> Result<&mut Self> {
    let state = self.state_mut()?;
    state.fields.clear_all()?;
    state.unknown_fields.clear();
    Ok(self)
  }

  pub fn get_field(&self, field: &FieldDescriptor) -> Result<Cow<'_, FieldValue>> {
    check_containing_type(&self.descriptor, field)?;
    Ok(self.state()?.fields.get(field))
  }

  pub fn has_field(&self, field: &FieldDescriptor) -> Result<bool> {
    check_containing_type(&self.descriptor, field)?;
    self.state()?.fields.has(field)
  }

  pub fn repeated_count(&self, field: &FieldDescriptor) -> Result<usize> {
    check_containing_type(&self.descriptor, field)?;
    self.state()?.fields.repeated_count(field)
  }

  //
  // Extensions
  //

  pub fn set_extension(
    &mut self,
    extension: &FieldDescriptor,
    value: impl Into<FieldValue>,
  ) -> Result<&mut Self> {
    self
      .extension_state(extension)?
      .fields
      .set(extension, value.into())?;
    Ok(self)
  }

  pub fn add_extension(
    &mut self,
    extension: &FieldDescriptor,
    value: impl Into<Value>,
  ) -> Result<&mut Self> {
    self
      .extension_state(extension)?
      .fields
      .add_repeated(extension, value.into())?;
    Ok(self)
  }

  pub fn clear_extension(&mut self, extension: &FieldDescriptor) -> Result<&mut Self> {
    self.extension_state(extension)?.fields.clear(extension)?;
    Ok(self)
  }

  pub fn get_extension(&self, extension: &FieldDescriptor) -> Result<Cow<'_, FieldValue>> {
    check_extension(&self.descriptor, extension)?;
    Ok(self.state()?.fields.get(extension))
  }

  pub fn has_extension(&self, extension: &FieldDescriptor) -> Result<bool> {
    check_extension(&self.descriptor, extension)?;
    self.state()?.fields.has(extension)
  }

  pub fn extension_count(&self, extension: &FieldDescriptor) -> Result<usize> {
    check_extension(&self.descriptor, extension)?;
    self.state()?.fields.repeated_count(extension)
  }

  //
  // Merging
  //

  /// Merges `other` into this builder: repeated fields are appended, singular scalars
  /// overwritten, singular messages merged recursively and unknown fields concatenated.
  pub fn merge_from(&mut self, other: &Message) -> Result<&mut Self> {
    if other.descriptor != self.descriptor {
      return Err(Error::MessageTypeMismatch {
        expected: self.descriptor.full_name().to_string(),
        actual: other.descriptor.full_name().to_string(),
      });
    }
    let state = self.state_mut()?;
    state.fields.merge_from(&other.data.fields)?;
    state.unknown_fields.merge_from(&other.data.unknown_fields)?;
    Ok(self)
  }

  /// Merges fields from `reader` until its end, its current limit, or an end-group tag.
  pub fn merge_from_reader(
    &mut self,
    reader: &mut CodedReader<'_>,
    registry: &ExtensionRegistry,
  ) -> Result<&mut Self> {
    self.merge_fields_from(reader, registry)?;
    Ok(self)
  }

  pub(crate) fn merge_fields_from(
    &mut self,
    reader: &mut CodedReader<'_>,
    registry: &ExtensionRegistry,
  ) -> Result<()> {
    let descriptor = self.descriptor.clone();
    let state = self.state_mut()?;
    decode::merge_from_reader(&descriptor, state, reader, registry)
  }

  pub fn merge_from_bytes(
    &mut self,
    bytes: &[u8],
    registry: &ExtensionRegistry,
  ) -> Result<&mut Self> {
    let mut reader = CodedReader::from_slice(bytes);
    self.merge_fields_from(&mut reader, registry)?;
    reader.check_last_tag_was(0)?;
    Ok(self)
  }

  /// Merges one length prefixed message from `input`. Returns false if `input` was already at its
  /// end.
  pub fn merge_delimited_from(
    &mut self,
    input: &mut dyn Read,
    registry: &ExtensionRegistry,
  ) -> Result<bool> {
    let Some(len) = read_delimiter(input)? else {
      return Ok(false);
    };
    let mut limited = input.take(len);
    let mut reader = CodedReader::from_stream(&mut limited);
    self.merge_fields_from(&mut reader, registry)?;
    reader.check_last_tag_was(0)?;
    if limited.limit() != 0 {
      return Err(pb_wire::Error::TruncatedMessage.into());
    }
    Ok(true)
  }

  pub fn set_unknown_fields(&mut self, unknown_fields: &UnknownFieldSet) -> Result<&mut Self> {
    self.state_mut()?.unknown_fields = unknown_fields.to_builder();
    Ok(self)
  }

  pub fn merge_unknown_fields(&mut self, unknown_fields: &UnknownFieldSet) -> Result<&mut Self> {
    self.state_mut()?.unknown_fields.merge_from(unknown_fields)?;
    Ok(self)
  }

  //
  // Finalization
  //

  pub fn is_initialized(&self) -> Result<bool> {
    let state = self.state()?;
    Ok(required_fields_present(&self.descriptor, &state.fields) && state.fields.is_initialized())
  }

  /// Builds the message, failing with [`Error::UninitializedMessage`] if a required field is
  /// missing. The builder stays usable after that failure.
  pub fn build(&mut self) -> Result<Message> {
    let state = self.state()?;
    if !required_fields_present(&self.descriptor, &state.fields) || !state.fields.is_initialized() {
      let mut missing_fields = Vec::new();
      collect_missing_fields(&self.descriptor, &state.fields, "", &mut missing_fields);
      return Err(
        UninitializedMessageError {
          message_type: self.descriptor.full_name().to_string(),
          missing_fields,
        }
        .into(),
      );
    }
    self.build_partial()
  }

  /// Builds the message without checking required fields.
  pub fn build_partial(&mut self) -> Result<Message> {
    let Some(state) = self.state.take() else {
      return Err(Error::AlreadyBuilt(self.descriptor.full_name().to_string()));
    };
    let mut fields = state.fields;
    fields.make_immutable();
    let unknown_fields = state.unknown_fields.build();
    log::trace!(
      "built {} with {} fields and {} unknown fields",
      self.descriptor.full_name(),
      fields.len(),
      unknown_fields.len()
    );
    Ok(Message::from_parts(
      self.descriptor.clone(),
      Arc::new(MessageData::new(fields, unknown_fields)),
    ))
  }

  // Missing required fields found while parsing are reported as malformed input.
  fn build_parsed(&mut self) -> Result<Message> {
    self.build().map_err(|e| match e {
      Error::UninitializedMessage(e) => Error::Wire(e.into_malformed_input()),
      e => e,
    })
  }
}

// Reads the varint length prefix of a delimited message one byte at a time so nothing past the
// prefix is consumed. Returns None on a clean end of input.
fn read_delimiter(input: &mut dyn Read) -> Result<Option<u64>> {
  let mut value: u64 = 0;
  for i in 0 .. pb_wire::varint::MAX_SIZE {
    let mut byte = [0u8; 1];
    let read = loop {
      match input.read(&mut byte) {
        Ok(read) => break read,
        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {},
        Err(e) => return Err(pb_wire::Error::from(e).into()),
      }
    };
    if read == 0 {
      if i == 0 {
        return Ok(None);
      }
      return Err(pb_wire::Error::TruncatedMessage.into());
    }

    value |= u64::from(byte[0] & 0x7F) << (7 * i);
    if byte[0] & 0x80 == 0 {
      #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
      let len = value as u32 as i32;
      return u64::try_from(len)
        .map(Some)
        .map_err(|_| pb_wire::Error::NegativeSize.into());
    }
  }
  Err(pb_wire::Error::MalformedVarint.into())
}
