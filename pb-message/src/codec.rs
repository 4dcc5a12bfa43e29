// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

//! Field level encoding on top of [`pb_wire`]. The size functions here predict exactly what the
//! matching write functions emit.

#[cfg(test)]
#[path = "./codec_test.rs"]
mod codec_test;

use crate::descriptor::{FieldDescriptor, FieldType};
use crate::value::{FieldValue, Value};
use pb_wire::size::{self, FIXED32_SIZE, FIXED64_SIZE};
use pb_wire::{CodedReader, CodedWriter, WireMessage, WireType};

/// Size of `value` encoded as `field_type`, without a tag. For groups this is the body only.
#[must_use]
pub fn compute_value_size_no_tag(field_type: FieldType, value: &Value) -> usize {
  match (field_type, value) {
    (FieldType::Int32, Value::I32(v)) => size::int32_size_no_tag(*v),
    (FieldType::SInt32, Value::I32(v)) => size::sint32_size_no_tag(*v),
    (FieldType::Int64, Value::I64(v)) => size::int64_size_no_tag(*v),
    (FieldType::SInt64, Value::I64(v)) => size::sint64_size_no_tag(*v),
    (FieldType::UInt32, Value::U32(v)) => size::uint32_size_no_tag(*v),
    (FieldType::UInt64, Value::U64(v)) => size::uint64_size_no_tag(*v),
    (FieldType::SFixed32, Value::I32(_))
    | (FieldType::Fixed32, Value::U32(_))
    | (FieldType::Float, Value::F32(_)) => FIXED32_SIZE,
    (FieldType::SFixed64, Value::I64(_))
    | (FieldType::Fixed64, Value::U64(_))
    | (FieldType::Double, Value::F64(_)) => FIXED64_SIZE,
    (FieldType::Bool, Value::Bool(_)) => size::bool_size_no_tag(),
    (FieldType::Enum(_), Value::Enum(v)) => size::enum_size_no_tag(*v),
    (FieldType::String, Value::String(v)) => size::string_size_no_tag(v),
    (FieldType::Bytes, Value::Bytes(v)) => size::bytes_size_no_tag(v),
    (FieldType::Message(_), Value::Message(m)) => {
      size::length_delimited_size_no_tag(m.serialized_size())
    },
    (FieldType::Group(_), Value::Message(m)) => m.serialized_size(),
    // FieldSet rejects values that do not match the field type, so nothing is emitted for them.
    _ => 0,
  }
}

/// Size of `value` encoded as `field_type` including its tag (both tags for a group).
#[must_use]
pub fn compute_value_size(field_type: FieldType, field_number: u32, value: &Value) -> usize {
  match field_type {
    FieldType::Group(_) => size::group_size(field_number, compute_value_size_no_tag(field_type, value)),
    _ => size::tag_size(field_number) + compute_value_size_no_tag(field_type, value),
  }
}

pub fn write_value_no_tag(
  writer: &mut CodedWriter<'_>,
  field_type: FieldType,
  value: &Value,
) -> pb_wire::Result<()> {
  match (field_type, value) {
    (FieldType::Int32, Value::I32(v)) => writer.write_int32_no_tag(*v),
    (FieldType::SInt32, Value::I32(v)) => writer.write_sint32_no_tag(*v),
    (FieldType::SFixed32, Value::I32(v)) => writer.write_sfixed32_no_tag(*v),
    (FieldType::Int64, Value::I64(v)) => writer.write_int64_no_tag(*v),
    (FieldType::SInt64, Value::I64(v)) => writer.write_sint64_no_tag(*v),
    (FieldType::SFixed64, Value::I64(v)) => writer.write_sfixed64_no_tag(*v),
    (FieldType::UInt32, Value::U32(v)) => writer.write_uint32_no_tag(*v),
    (FieldType::Fixed32, Value::U32(v)) => writer.write_fixed32_no_tag(*v),
    (FieldType::UInt64, Value::U64(v)) => writer.write_uint64_no_tag(*v),
    (FieldType::Fixed64, Value::U64(v)) => writer.write_fixed64_no_tag(*v),
    (FieldType::Float, Value::F32(v)) => writer.write_float_no_tag(*v),
    (FieldType::Double, Value::F64(v)) => writer.write_double_no_tag(*v),
    (FieldType::Bool, Value::Bool(v)) => writer.write_bool_no_tag(*v),
    (FieldType::Enum(_), Value::Enum(v)) => writer.write_enum_no_tag(*v),
    (FieldType::String, Value::String(v)) => writer.write_string_no_tag(v),
    (FieldType::Bytes, Value::Bytes(v)) => writer.write_bytes_no_tag(v),
    (FieldType::Message(_), Value::Message(m)) => writer.write_message_no_tag(m),
    (FieldType::Group(_), Value::Message(m)) => m.write_to(writer),
    _ => Ok(()),
  }
}

pub fn write_value(
  writer: &mut CodedWriter<'_>,
  field_type: FieldType,
  field_number: u32,
  value: &Value,
) -> pb_wire::Result<()> {
  match (field_type, value) {
    (FieldType::Group(_), Value::Message(m)) => writer.write_group(field_number, m),
    _ => {
      writer.write_tag(field_number, field_type.wire_type())?;
      write_value_no_tag(writer, field_type, value)
    },
  }
}

fn packed_data_size(field_type: FieldType, values: &[Value]) -> usize {
  values
    .iter()
    .map(|value| compute_value_size_no_tag(field_type, value))
    .sum()
}

/// Encoded size of a whole field: every element of a repeated field, a single length-delimited
/// run for a packed field, or a MessageSet item for a MessageSet extension.
#[must_use]
pub fn compute_field_size(field: &FieldDescriptor, value: &FieldValue) -> usize {
  let field_type = field.field_type();
  let number = field.number();
  match value {
    FieldValue::Single(Value::Message(m)) if field.is_message_set_item() => {
      size::message_set_extension_size(number, m.serialized_size())
    },
    FieldValue::Single(value) => compute_value_size(field_type, number, value),
    FieldValue::Repeated(values) if values.is_empty() => 0,
    FieldValue::Repeated(values) if field.is_packed() => {
      size::tag_size(number) + size::length_delimited_size_no_tag(packed_data_size(field_type, values))
    },
    FieldValue::Repeated(values) => values
      .iter()
      .map(|value| compute_value_size(field_type, number, value))
      .sum(),
  }
}

pub fn write_field(
  writer: &mut CodedWriter<'_>,
  field: &FieldDescriptor,
  value: &FieldValue,
) -> pb_wire::Result<()> {
  let field_type = field.field_type();
  let number = field.number();
  match value {
    FieldValue::Single(Value::Message(m)) if field.is_message_set_item() => {
      writer.write_message_set_extension(number, m)
    },
    FieldValue::Single(value) => write_value(writer, field_type, number, value),
    FieldValue::Repeated(values) if values.is_empty() => Ok(()),
    FieldValue::Repeated(values) if field.is_packed() => {
      writer.write_tag(number, WireType::LengthDelimited)?;
      writer.write_length(packed_data_size(field_type, values))?;
      for value in values {
        write_value_no_tag(writer, field_type, value)?;
      }
      Ok(())
    },
    FieldValue::Repeated(values) => {
      for value in values {
        write_value(writer, field_type, number, value)?;
      }
      Ok(())
    },
  }
}

/// Reads one scalar encoded as `field_type`. Returns `None` for message and group types, which
/// need a builder to read into.
pub fn read_scalar_no_tag(
  reader: &mut CodedReader<'_>,
  field_type: FieldType,
) -> pb_wire::Result<Option<Value>> {
  let value = match field_type {
    FieldType::Double => Value::F64(reader.read_double()?),
    FieldType::Float => Value::F32(reader.read_float()?),
    FieldType::Int64 => Value::I64(reader.read_int64()?),
    FieldType::UInt64 => Value::U64(reader.read_uint64()?),
    FieldType::Int32 => Value::I32(reader.read_int32()?),
    FieldType::Fixed64 => Value::U64(reader.read_fixed64()?),
    FieldType::Fixed32 => Value::U32(reader.read_fixed32()?),
    FieldType::Bool => Value::Bool(reader.read_bool()?),
    FieldType::String => Value::String(reader.read_string()?),
    FieldType::Bytes => Value::Bytes(reader.read_bytes()?),
    FieldType::UInt32 => Value::U32(reader.read_uint32()?),
    FieldType::Enum(_) => Value::Enum(reader.read_enum()?),
    FieldType::SFixed32 => Value::I32(reader.read_sfixed32()?),
    FieldType::SFixed64 => Value::I64(reader.read_sfixed64()?),
    FieldType::SInt32 => Value::I32(reader.read_sint32()?),
    FieldType::SInt64 => Value::I64(reader.read_sint64()?),
    FieldType::Group(_) | FieldType::Message(_) => return Ok(None),
  };
  Ok(Some(value))
}
