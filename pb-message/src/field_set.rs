// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./field_set_test.rs"]
mod field_set_test;

use crate::codec;
use crate::descriptor::{FieldDescriptor, FieldType};
use crate::message::Message;
use crate::value::{FieldValue, Value};
use crate::{Error, Result};
use pb_wire::CodedWriter;
use std::borrow::Cow;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
struct FieldEntry {
  descriptor: FieldDescriptor,
  value: FieldValue,
}

//
// FieldSet
//

/// Type checked storage of a message's known field values, regular and extension alike, keyed by
/// field number. Iteration is always in ascending field number order.
#[derive(Clone, Debug, Default)]
pub struct FieldSet {
  fields: BTreeMap<u32, FieldEntry>,
  immutable: bool,
}

impl PartialEq for FieldSet {
  fn eq(&self, other: &Self) -> bool {
    self
      .fields
      .iter()
      .map(|(number, entry)| (number, &entry.value))
      .eq(other.fields.iter().map(|(number, entry)| (number, &entry.value)))
  }
}

impl FieldSet {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  pub(crate) fn new_immutable() -> Self {
    Self {
      fields: BTreeMap::new(),
      immutable: true,
    }
  }

  /// A mutable copy of this set, used to seed a builder from an existing message.
  #[must_use]
  pub fn to_mutable(&self) -> Self {
    Self {
      fields: self.fields.clone(),
      immutable: false,
    }
  }

  fn check_mutable(&self) -> Result<()> {
    if self.immutable {
      return Err(Error::Immutable);
    }
    Ok(())
  }

  #[must_use]
  pub const fn is_immutable(&self) -> bool {
    self.immutable
  }

  /// Freezes the set. Every later mutation fails with [`Error::Immutable`].
  pub fn make_immutable(&mut self) {
    self.immutable = true;
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.fields.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  pub(crate) fn find(&self, field_number: u32) -> Option<&FieldValue> {
    self.fields.get(&field_number).map(|entry| &entry.value)
  }

  pub(crate) fn contains(&self, field_number: u32) -> bool {
    self.fields.contains_key(&field_number)
  }

  /// Returns the stored value, the field's default if a singular field is unset, or an empty list
  /// if a repeated field is unset.
  #[must_use]
  pub fn get(&self, field: &FieldDescriptor) -> Cow<'_, FieldValue> {
    match self.fields.get(&field.number()) {
      Some(entry) => Cow::Borrowed(&entry.value),
      None if field.is_repeated() => Cow::Owned(FieldValue::Repeated(Vec::new())),
      None => Cow::Owned(FieldValue::Single(field.default_value())),
    }
  }

  pub fn get_repeated(&self, field: &FieldDescriptor, index: usize) -> Result<&Value> {
    let values = self.repeated_values(field)?;
    values.get(index).ok_or_else(|| Error::IndexOutOfBounds {
      field: field.full_name().to_string(),
      index,
      len: values.len(),
    })
  }

  fn repeated_values(&self, field: &FieldDescriptor) -> Result<&[Value]> {
    if !field.is_repeated() {
      return Err(Error::FieldCardinality(field.full_name().to_string()));
    }
    Ok(
      self
        .fields
        .get(&field.number())
        .and_then(|entry| entry.value.as_repeated())
        .unwrap_or_default(),
    )
  }

  /// Replaces the whole value of `field`. Setting a repeated field to an empty list clears it.
  pub fn set(&mut self, field: &FieldDescriptor, value: FieldValue) -> Result<()> {
    self.check_mutable()?;
    match &value {
      FieldValue::Single(single) if !field.is_repeated() => check_value(field, single)?,
      FieldValue::Repeated(values) if field.is_repeated() => {
        for single in values {
          check_value(field, single)?;
        }
        if values.is_empty() {
          self.fields.remove(&field.number());
          return Ok(());
        }
      },
      _ => return Err(Error::FieldCardinality(field.full_name().to_string())),
    }

    self.fields.insert(
      field.number(),
      FieldEntry {
        descriptor: field.clone(),
        value,
      },
    );
    Ok(())
  }

  pub fn set_repeated(&mut self, field: &FieldDescriptor, index: usize, value: Value) -> Result<()> {
    self.check_mutable()?;
    if !field.is_repeated() {
      return Err(Error::FieldCardinality(field.full_name().to_string()));
    }
    check_value(field, &value)?;

    let values = self
      .fields
      .get_mut(&field.number())
      .and_then(|entry| match &mut entry.value {
        FieldValue::Repeated(values) => Some(values),
        FieldValue::Single(_) => None,
      });
    let len = values.as_ref().map_or(0, |values| values.len());
    match values.and_then(|values| values.get_mut(index)) {
      Some(slot) => {
        *slot = value;
        Ok(())
      },
      None => Err(Error::IndexOutOfBounds {
        field: field.full_name().to_string(),
        index,
        len,
      }),
    }
  }

  pub fn add_repeated(&mut self, field: &FieldDescriptor, value: Value) -> Result<()> {
    self.check_mutable()?;
    if !field.is_repeated() {
      return Err(Error::FieldCardinality(field.full_name().to_string()));
    }
    check_value(field, &value)?;

    let entry = self
      .fields
      .entry(field.number())
      .or_insert_with(|| FieldEntry {
        descriptor: field.clone(),
        value: FieldValue::Repeated(Vec::new()),
      });
    if let FieldValue::Repeated(values) = &mut entry.value {
      values.push(value);
    }
    Ok(())
  }

  pub fn clear(&mut self, field: &FieldDescriptor) -> Result<()> {
    self.check_mutable()?;
    self.fields.remove(&field.number());
    Ok(())
  }

  pub fn clear_all(&mut self) -> Result<()> {
    self.check_mutable()?;
    self.fields.clear();
    Ok(())
  }

  /// Presence of a singular field. Repeated fields have no presence, use
  /// [`FieldSet::repeated_count`] instead.
  pub fn has(&self, field: &FieldDescriptor) -> Result<bool> {
    if field.is_repeated() {
      return Err(Error::HasOnRepeatedField(field.full_name().to_string()));
    }
    Ok(self.fields.contains_key(&field.number()))
  }

  pub fn repeated_count(&self, field: &FieldDescriptor) -> Result<usize> {
    self.repeated_values(field).map(<[Value]>::len)
  }

  /// Every set field with its value, ordered by field number.
  pub fn all_fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &FieldValue)> + '_ {
    self
      .fields
      .values()
      .map(|entry| (&entry.descriptor, &entry.value))
  }

  /// Whether every embedded message, singular or repeated, is itself initialized. Required field
  /// presence at this level is checked by the message layer.
  #[must_use]
  pub fn is_initialized(&self) -> bool {
    self.fields.values().all(|entry| match &entry.value {
      FieldValue::Single(value) => value.as_message().is_none_or(Message::is_initialized),
      FieldValue::Repeated(values) => values
        .iter()
        .all(|value| value.as_message().is_none_or(Message::is_initialized)),
    })
  }

  /// Merges `other` into this set. Repeated values are appended, singular scalars overwritten,
  /// and singular messages merged recursively unless this side is unset or empty.
  pub fn merge_from(&mut self, other: &Self) -> Result<()> {
    self.check_mutable()?;

    for (number, other_entry) in &other.fields {
      let merged = match (&other_entry.value, self.fields.get_mut(number)) {
        (
          FieldValue::Repeated(other_values),
          Some(FieldEntry {
            value: FieldValue::Repeated(values),
            ..
          }),
        ) => {
          values.extend(other_values.iter().cloned());
          continue;
        },
        (
          FieldValue::Single(Value::Message(other_message)),
          Some(FieldEntry {
            value: FieldValue::Single(Value::Message(existing)),
            ..
          }),
        ) if !existing.is_default_instance() => {
          let mut builder = existing.to_builder();
          builder.merge_from(other_message)?;
          FieldValue::Single(Value::Message(builder.build_partial()?))
        },
        (value, _) => value.clone(),
      };

      self.fields.insert(
        *number,
        FieldEntry {
          descriptor: other_entry.descriptor.clone(),
          value: merged,
        },
      );
    }
    Ok(())
  }

  #[must_use]
  pub fn serialized_size(&self) -> usize {
    self
      .fields
      .values()
      .map(|entry| codec::compute_field_size(&entry.descriptor, &entry.value))
      .sum()
  }

  pub fn write_to(&self, writer: &mut CodedWriter<'_>) -> pb_wire::Result<()> {
    for entry in self.fields.values() {
      codec::write_field(writer, &entry.descriptor, &entry.value)?;
    }
    Ok(())
  }
}

fn check_value(field: &FieldDescriptor, value: &Value) -> Result<()> {
  let field_type = field.field_type();
  let matches = value.matches_type(field_type)
    && match (field_type, value) {
      (FieldType::Enum(_), Value::Enum(number)) => field
        .enum_type()
        .is_some_and(|enum_type| enum_type.contains(*number)),
      (FieldType::Message(_) | FieldType::Group(_), Value::Message(message)) => field
        .message_type()
        .is_some_and(|message_type| *message.descriptor() == message_type),
      _ => true,
    };
  if matches {
    return Ok(());
  }

  let actual = match value {
    Value::Message(message) => message.descriptor().full_name().to_string(),
    Value::Enum(number) if value.matches_type(field_type) => format!("undeclared enum value {number}"),
    _ => value.type_name().to_string(),
  };
  Err(Error::TypeMismatch {
    message_type: field.containing_type().full_name().to_string(),
    field: field.full_name().to_string(),
    actual,
  })
}
