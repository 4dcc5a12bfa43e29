// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

//! Storage for fields the schema does not recognize. Everything read into an
//! [`UnknownFieldSet`] is written back out unchanged, ordered by field number and, within a
//! field, by wire type.

#[cfg(test)]
#[path = "./unknown_test.rs"]
mod unknown_test;

use crate::{Error, Result};
use bytes::Bytes;
use pb_wire::{CodedReader, CodedWriter, WireMessage, WireType, size, tag_field_number};
use std::collections::BTreeMap;

static EMPTY_FIELD: UnknownField = UnknownField::new();

//
// UnknownField
//

/// Every value seen for one unknown field number, grouped by wire type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnknownField {
  varints: Vec<u64>,
  fixed32s: Vec<u32>,
  fixed64s: Vec<u64>,
  length_delimited: Vec<Bytes>,
  groups: Vec<UnknownFieldSet>,
}

impl UnknownField {
  #[must_use]
  pub const fn new() -> Self {
    Self {
      varints: Vec::new(),
      fixed32s: Vec::new(),
      fixed64s: Vec::new(),
      length_delimited: Vec::new(),
      groups: Vec::new(),
    }
  }

  #[must_use]
  pub fn varints(&self) -> &[u64] {
    &self.varints
  }

  #[must_use]
  pub fn fixed32s(&self) -> &[u32] {
    &self.fixed32s
  }

  #[must_use]
  pub fn fixed64s(&self) -> &[u64] {
    &self.fixed64s
  }

  #[must_use]
  pub fn length_delimited(&self) -> &[Bytes] {
    &self.length_delimited
  }

  #[must_use]
  pub fn groups(&self) -> &[UnknownFieldSet] {
    &self.groups
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.varints.is_empty()
      && self.fixed32s.is_empty()
      && self.fixed64s.is_empty()
      && self.length_delimited.is_empty()
      && self.groups.is_empty()
  }

  pub fn add_varint(&mut self, value: u64) -> &mut Self {
    self.varints.push(value);
    self
  }

  pub fn add_fixed32(&mut self, value: u32) -> &mut Self {
    self.fixed32s.push(value);
    self
  }

  pub fn add_fixed64(&mut self, value: u64) -> &mut Self {
    self.fixed64s.push(value);
    self
  }

  pub fn add_length_delimited(&mut self, value: impl Into<Bytes>) -> &mut Self {
    self.length_delimited.push(value.into());
    self
  }

  pub fn add_group(&mut self, value: UnknownFieldSet) -> &mut Self {
    self.groups.push(value);
    self
  }

  /// Appends every value of `other` after the values already present.
  pub fn merge_from(&mut self, other: &Self) -> &mut Self {
    self.varints.extend_from_slice(&other.varints);
    self.fixed32s.extend_from_slice(&other.fixed32s);
    self.fixed64s.extend_from_slice(&other.fixed64s);
    self
      .length_delimited
      .extend(other.length_delimited.iter().cloned());
    self.groups.extend(other.groups.iter().cloned());
    self
  }

  #[must_use]
  pub fn serialized_size(&self, field_number: u32) -> usize {
    self
      .varints
      .iter()
      .map(|value| size::uint64_size(field_number, *value))
      .sum::<usize>()
      + self.fixed32s.len() * size::fixed32_size(field_number)
      + self.fixed64s.len() * size::fixed64_size(field_number)
      + self
        .length_delimited
        .iter()
        .map(|value| size::bytes_size(field_number, value))
        .sum::<usize>()
      + self
        .groups
        .iter()
        .map(|group| size::group_size(field_number, group.serialized_size()))
        .sum::<usize>()
  }

  pub fn write_to(&self, field_number: u32, writer: &mut CodedWriter<'_>) -> pb_wire::Result<()> {
    for value in &self.varints {
      writer.write_uint64(field_number, *value)?;
    }
    for value in &self.fixed32s {
      writer.write_fixed32(field_number, *value)?;
    }
    for value in &self.fixed64s {
      writer.write_fixed64(field_number, *value)?;
    }
    for value in &self.length_delimited {
      writer.write_bytes(field_number, value)?;
    }
    for group in &self.groups {
      writer.write_group(field_number, group)?;
    }
    Ok(())
  }

  /// Size when length-delimited values are written as MessageSet items keyed by `field_number`.
  #[must_use]
  pub fn serialized_size_as_message_set_extension(&self, field_number: u32) -> usize {
    let items: usize = self
      .length_delimited
      .iter()
      .map(|value| size::message_set_extension_size(field_number, value.len()))
      .sum();
    let others = Self {
      length_delimited: Vec::new(),
      ..self.clone()
    };
    items + others.serialized_size(field_number)
  }

  pub fn write_as_message_set_extension_to(
    &self,
    field_number: u32,
    writer: &mut CodedWriter<'_>,
  ) -> pb_wire::Result<()> {
    for value in &self.length_delimited {
      writer.write_raw_message_set_extension(field_number, value)?;
    }
    for value in &self.varints {
      writer.write_uint64(field_number, *value)?;
    }
    for value in &self.fixed32s {
      writer.write_fixed32(field_number, *value)?;
    }
    for value in &self.fixed64s {
      writer.write_fixed64(field_number, *value)?;
    }
    for group in &self.groups {
      writer.write_group(field_number, group)?;
    }
    Ok(())
  }
}

//
// UnknownFieldSet
//

/// An immutable collection of unknown fields keyed by field number.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnknownFieldSet {
  fields: BTreeMap<u32, UnknownField>,
}

impl UnknownFieldSet {
  #[must_use]
  pub const fn new() -> Self {
    Self {
      fields: BTreeMap::new(),
    }
  }

  pub fn parse_from(bytes: &[u8]) -> Result<Self> {
    let mut builder = UnknownFieldSetBuilder::new();
    builder.merge_from_bytes(bytes)?;
    Ok(builder.build())
  }

  pub fn parse_from_reader(reader: &mut CodedReader<'_>) -> Result<Self> {
    let mut builder = UnknownFieldSetBuilder::new();
    builder.merge_from_reader(reader)?;
    Ok(builder.build())
  }

  #[must_use]
  pub fn has_field(&self, field_number: u32) -> bool {
    self.fields.contains_key(&field_number)
  }

  /// Returns the record for `field_number`, or an empty record if the field is absent.
  #[must_use]
  pub fn get(&self, field_number: u32) -> &UnknownField {
    self.fields.get(&field_number).unwrap_or(&EMPTY_FIELD)
  }

  /// Read-only view ordered by field number.
  #[must_use]
  pub const fn fields(&self) -> &BTreeMap<u32, UnknownField> {
    &self.fields
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.fields.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  #[must_use]
  pub fn serialized_size(&self) -> usize {
    self
      .fields
      .iter()
      .map(|(number, field)| field.serialized_size(*number))
      .sum()
  }

  pub fn write_to(&self, writer: &mut CodedWriter<'_>) -> pb_wire::Result<()> {
    for (number, field) in &self.fields {
      field.write_to(*number, writer)?;
    }
    Ok(())
  }

  #[must_use]
  pub fn serialized_size_as_message_set(&self) -> usize {
    self
      .fields
      .iter()
      .map(|(number, field)| field.serialized_size_as_message_set_extension(*number))
      .sum()
  }

  pub fn write_as_message_set_to(&self, writer: &mut CodedWriter<'_>) -> pb_wire::Result<()> {
    for (number, field) in &self.fields {
      field.write_as_message_set_extension_to(*number, writer)?;
    }
    Ok(())
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>> {
    Ok(pb_wire::writer::encode_to_vec(self)?)
  }

  #[must_use]
  pub fn to_builder(&self) -> UnknownFieldSetBuilder {
    UnknownFieldSetBuilder {
      fields: self.fields.clone(),
      last_field: None,
    }
  }
}

impl WireMessage for UnknownFieldSet {
  fn serialized_size(&self) -> usize {
    Self::serialized_size(self)
  }

  fn write_to(&self, writer: &mut CodedWriter<'_>) -> pb_wire::Result<()> {
    Self::write_to(self, writer)
  }
}

//
// UnknownFieldSetBuilder
//

/// Mutable counterpart of [`UnknownFieldSet`]. Consecutive merges into the same field number
/// accumulate in a cursor record that is moved into the map only when a different field number is
/// touched or the set is built.
#[derive(Debug, Default)]
pub struct UnknownFieldSetBuilder {
  fields: BTreeMap<u32, UnknownField>,
  last_field: Option<(u32, UnknownField)>,
}

impl UnknownFieldSetBuilder {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  fn flush_last_field(&mut self) {
    if let Some((number, field)) = self.last_field.take()
      && !field.is_empty()
    {
      self.fields.insert(number, field);
    }
  }

  fn field_builder(&mut self, field_number: u32) -> Result<&mut UnknownField> {
    if field_number == 0 {
      return Err(Error::ZeroFieldNumber);
    }

    let is_current = matches!(&self.last_field, Some((number, _)) if *number == field_number);
    if !is_current {
      self.flush_last_field();
      let existing = self.fields.remove(&field_number).unwrap_or_default();
      self.last_field = Some((field_number, existing));
    }
    Ok(
      &mut self
        .last_field
        .get_or_insert_with(|| (field_number, UnknownField::new()))
        .1,
    )
  }

  #[must_use]
  pub fn has_field(&self, field_number: u32) -> bool {
    matches!(&self.last_field, Some((number, field)) if *number == field_number && !field.is_empty())
      || self.fields.contains_key(&field_number)
  }

  /// Replaces whatever is stored for `field_number` with `field`.
  pub fn add_field(&mut self, field_number: u32, field: UnknownField) -> Result<&mut Self> {
    if field_number == 0 {
      return Err(Error::ZeroFieldNumber);
    }
    if matches!(&self.last_field, Some((number, _)) if *number == field_number) {
      self.last_field = None;
    }
    if field.is_empty() {
      self.fields.remove(&field_number);
    } else {
      self.fields.insert(field_number, field);
    }
    Ok(self)
  }

  /// Appends the values of `field` to whatever is stored for `field_number`.
  pub fn merge_field(&mut self, field_number: u32, field: &UnknownField) -> Result<&mut Self> {
    self.field_builder(field_number)?.merge_from(field);
    Ok(self)
  }

  pub fn merge_varint_field(&mut self, field_number: u32, value: u64) -> Result<&mut Self> {
    self.field_builder(field_number)?.add_varint(value);
    Ok(self)
  }

  pub fn merge_length_delimited_field(
    &mut self,
    field_number: u32,
    value: impl Into<Bytes>,
  ) -> Result<&mut Self> {
    self.field_builder(field_number)?.add_length_delimited(value);
    Ok(self)
  }

  pub fn merge_from(&mut self, other: &UnknownFieldSet) -> Result<&mut Self> {
    for (number, field) in &other.fields {
      self.merge_field(*number, field)?;
    }
    Ok(self)
  }

  /// Reads the value of the field whose `tag` was just consumed and stores it. Returns false
  /// without storing anything if `tag` is an end-group tag.
  pub fn merge_field_from(&mut self, tag: u32, reader: &mut CodedReader<'_>) -> Result<bool> {
    let field_number = tag_field_number(tag);
    match WireType::try_from(tag)? {
      WireType::Varint => {
        let value = reader.read_uint64()?;
        self.field_builder(field_number)?.add_varint(value);
      },
      WireType::Fixed64 => {
        let value = reader.read_fixed64()?;
        self.field_builder(field_number)?.add_fixed64(value);
      },
      WireType::LengthDelimited => {
        let value = reader.read_bytes()?;
        self.field_builder(field_number)?.add_length_delimited(value);
      },
      WireType::StartGroup => {
        let group = reader.read_group(field_number, |reader| -> Result<UnknownFieldSet> {
          UnknownFieldSet::parse_from_reader(reader)
        })?;
        self.field_builder(field_number)?.add_group(group);
      },
      WireType::EndGroup => return Ok(false),
      WireType::Fixed32 => {
        let value = reader.read_fixed32()?;
        self.field_builder(field_number)?.add_fixed32(value);
      },
    }
    Ok(true)
  }

  /// Merges fields until the end of the input, the current limit, or an end-group tag.
  pub fn merge_from_reader(&mut self, reader: &mut CodedReader<'_>) -> Result<&mut Self> {
    loop {
      let tag = reader.read_tag()?;
      if tag == 0 || !self.merge_field_from(tag, reader)? {
        return Ok(self);
      }
    }
  }

  pub fn merge_from_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
    let mut reader = CodedReader::from_slice(bytes);
    self.merge_from_reader(&mut reader)?;
    reader.check_last_tag_was(0)?;
    Ok(self)
  }

  pub fn clear(&mut self) -> &mut Self {
    self.fields.clear();
    self.last_field = None;
    self
  }

  #[must_use]
  pub fn build(mut self) -> UnknownFieldSet {
    self.flush_last_field();
    UnknownFieldSet {
      fields: self.fields,
    }
  }
}
