// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

//! Schema driven decoding of fields into a builder's state.

#[cfg(test)]
#[path = "./decode_test.rs"]
mod decode_test;

use crate::codec;
use crate::descriptor::{FieldDescriptor, FieldType, MessageDescriptor};
use crate::extension::ExtensionRegistry;
use crate::message::{Builder, BuilderState};
use crate::value::{FieldValue, Value};
use crate::Result;
use bytes::Bytes;
use pb_wire::tag::message_set;
use pb_wire::{CodedReader, WireType, tag_field_number};

/// Merges fields until the end of the input, the current limit, or an end-group tag.
pub(crate) fn merge_from_reader(
  descriptor: &MessageDescriptor,
  state: &mut BuilderState,
  reader: &mut CodedReader<'_>,
  registry: &ExtensionRegistry,
) -> Result<()> {
  loop {
    let tag = reader.read_tag()?;
    if tag == 0 || !merge_field_from(descriptor, state, tag, reader, registry)? {
      return Ok(());
    }
  }
}

// Returns false if `tag` is an end-group tag.
fn merge_field_from(
  descriptor: &MessageDescriptor,
  state: &mut BuilderState,
  tag: u32,
  reader: &mut CodedReader<'_>,
  registry: &ExtensionRegistry,
) -> Result<bool> {
  if tag == message_set::ITEM_TAG && descriptor.is_message_set_wire_format() {
    merge_message_set_item(descriptor, state, reader, registry)?;
    return Ok(true);
  }

  let wire_type = WireType::try_from(tag)?;
  if wire_type == WireType::EndGroup {
    return Ok(false);
  }

  let number = tag_field_number(tag);
  let field = descriptor.field_by_number(number).or_else(|| {
    descriptor
      .is_extension_number(number)
      .then(|| registry.lookup_by_number(descriptor, number))
      .flatten()
      .map(|info| info.descriptor)
  });
  let Some(field) = field else {
    return state.unknown_fields.merge_field_from(tag, reader);
  };

  let field_type = field.field_type();
  if field.is_repeated() && field_type.is_packable() && wire_type == WireType::LengthDelimited {
    merge_packed(&field, state, reader)?;
    return Ok(true);
  }

  if wire_type != field_type.wire_type() {
    log::trace!(
      "field {} arrived with wire type {wire_type:?}, keeping it as an unknown field",
      field.full_name()
    );
    return state.unknown_fields.merge_field_from(tag, reader);
  }

  match codec::read_scalar_no_tag(reader, field_type)? {
    Some(value) => store_value(&field, state, value)?,
    None => merge_message_field(&field, state, reader, registry)?,
  }
  Ok(true)
}

fn merge_packed(
  field: &FieldDescriptor,
  state: &mut BuilderState,
  reader: &mut CodedReader<'_>,
) -> Result<()> {
  let len = reader.read_length()?;
  let old_limit = reader.push_limit(len)?;
  while !reader.is_at_end()? {
    let Some(value) = codec::read_scalar_no_tag(reader, field.field_type())? else {
      break;
    };
    store_value(field, state, value)?;
  }
  reader.pop_limit(old_limit);
  Ok(())
}

// Stores a decoded value. Enum numbers the enum type does not declare are kept as unknown varints.
fn store_value(field: &FieldDescriptor, state: &mut BuilderState, value: Value) -> Result<()> {
  if let Value::Enum(number) = value
    && let Some(enum_type) = field.enum_type()
    && !enum_type.contains(number)
  {
    log::trace!(
      "value {number} is not declared by {}, keeping it as an unknown field",
      enum_type.full_name()
    );
    #[allow(clippy::cast_sign_loss)]
    let raw = i64::from(number) as u64;
    state
      .unknown_fields
      .merge_varint_field(field.number(), raw)?;
    return Ok(());
  }

  if field.is_repeated() {
    state.fields.add_repeated(field, value)
  } else {
    state.fields.set(field, FieldValue::Single(value))
  }
}

// A builder seeded with the current value of a singular message field, so that repeated
// occurrences of the field on the wire merge instead of replacing each other.
fn message_builder(
  field: &FieldDescriptor,
  message_type: &MessageDescriptor,
  state: &BuilderState,
) -> Builder {
  match state.fields.find(field.number()) {
    Some(FieldValue::Single(Value::Message(existing))) if !field.is_repeated() => {
      existing.to_builder()
    },
    _ => Builder::new(message_type),
  }
}

fn merge_message_field(
  field: &FieldDescriptor,
  state: &mut BuilderState,
  reader: &mut CodedReader<'_>,
  registry: &ExtensionRegistry,
) -> Result<()> {
  let Some(message_type) = field.message_type() else {
    return Ok(());
  };
  let mut builder = message_builder(field, &message_type, state);
  if let FieldType::Group(_) = field.field_type() {
    reader.read_group(field.number(), |reader| builder.merge_fields_from(reader, registry))?;
  } else {
    reader.read_message(|reader| builder.merge_fields_from(reader, registry))?;
  }
  store_value(field, state, Value::Message(builder.build_partial()?))
}

// Reads a MessageSet item group whose start tag was just consumed. The type id and the message
// may arrive in either order, so the message bytes are buffered until the group ends.
fn merge_message_set_item(
  descriptor: &MessageDescriptor,
  state: &mut BuilderState,
  reader: &mut CodedReader<'_>,
  registry: &ExtensionRegistry,
) -> Result<()> {
  let mut type_id = 0;
  let mut payload: Option<Bytes> = None;
  reader.read_group(message_set::ITEM, |reader| -> Result<()> {
    loop {
      match reader.read_tag()? {
        0 => return Ok(()),
        message_set::TYPE_ID_TAG => type_id = reader.read_uint32()?,
        message_set::MESSAGE_TAG => payload = Some(reader.read_bytes()?),
        tag => {
          if !reader.skip_field(tag)? {
            return Ok(());
          }
        },
      }
    }
  })?;

  let Some(payload) = payload else {
    log::debug!("dropping MessageSet item without a message");
    return Ok(());
  };
  if type_id == 0 {
    log::debug!("dropping MessageSet item without a type id");
    return Ok(());
  }

  let extension = registry
    .lookup_by_number(descriptor, type_id)
    .map(|info| info.descriptor)
    .filter(FieldDescriptor::is_message_set_item);
  let Some((extension, message_type)) =
    extension.and_then(|extension| extension.message_type().map(|t| (extension, t)))
  else {
    state
      .unknown_fields
      .merge_length_delimited_field(type_id, payload)?;
    return Ok(());
  };

  // The item body sits one level below the current depth, as a regular embedded message would.
  let options = *reader.options();
  let Some(remaining) = options
    .recursion_limit
    .checked_sub(reader.recursion_depth() + 1)
  else {
    return Err(pb_wire::Error::RecursionLimitExceeded(options.recursion_limit).into());
  };
  let mut item_reader =
    CodedReader::from_slice_with_options(&payload, options.with_recursion_limit(remaining));

  let mut builder = message_builder(&extension, &message_type, state);
  builder.merge_fields_from(&mut item_reader, registry)?;
  item_reader.check_last_tag_was(0)?;
  store_value(&extension, state, Value::Message(builder.build_partial()?))
}
