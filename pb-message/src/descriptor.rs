// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

//! Schema descriptors.
//!
//! All message, enum and field definitions live in one [`Schema`] arena and refer to each other by
//! index, which lets message types reference themselves or each other without ownership cycles.
//! Descriptor handles pair an `Arc<Schema>` with an index and are cheap to clone.

#[cfg(test)]
#[path = "./descriptor_test.rs"]
mod descriptor_test;

use crate::message::MessageData;
use crate::value::Value;
use crate::{Error, Message, Result};
use pb_wire::WireType;
use pb_wire::tag::MAX_FIELD_NUMBER;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageTypeId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumTypeId(usize);

//
// FieldType
//

/// The declared type of a field. Several types share a wire type and an in-memory [`Value`]
/// variant but differ in how they are encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
  Double,
  Float,
  Int64,
  UInt64,
  Int32,
  Fixed64,
  Fixed32,
  Bool,
  String,
  Group(MessageTypeId),
  Message(MessageTypeId),
  Bytes,
  UInt32,
  Enum(EnumTypeId),
  SFixed32,
  SFixed64,
  SInt32,
  SInt64,
}

impl FieldType {
  #[must_use]
  pub const fn wire_type(self) -> WireType {
    match self {
      Self::Int32
      | Self::Int64
      | Self::UInt32
      | Self::UInt64
      | Self::SInt32
      | Self::SInt64
      | Self::Bool
      | Self::Enum(_) => WireType::Varint,
      Self::Fixed64 | Self::SFixed64 | Self::Double => WireType::Fixed64,
      Self::Fixed32 | Self::SFixed32 | Self::Float => WireType::Fixed32,
      Self::String | Self::Bytes | Self::Message(_) => WireType::LengthDelimited,
      Self::Group(_) => WireType::StartGroup,
    }
  }

  #[must_use]
  pub const fn is_packable(self) -> bool {
    self.wire_type().is_packable()
  }

  #[must_use]
  pub const fn message_type(self) -> Option<MessageTypeId> {
    match self {
      Self::Message(id) | Self::Group(id) => Some(id),
      _ => None,
    }
  }

  /// Name of the in-memory value kind this field type maps to, used in diagnostics.
  #[must_use]
  pub const fn mapped_type_name(self) -> &'static str {
    match self {
      Self::Int32 | Self::SInt32 | Self::SFixed32 => "int32",
      Self::Int64 | Self::SInt64 | Self::SFixed64 => "int64",
      Self::UInt32 | Self::Fixed32 => "uint32",
      Self::UInt64 | Self::Fixed64 => "uint64",
      Self::Float => "float",
      Self::Double => "double",
      Self::Bool => "bool",
      Self::String => "string",
      Self::Bytes => "bytes",
      Self::Enum(_) => "enum",
      Self::Message(_) | Self::Group(_) => "message",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cardinality {
  Optional,
  Required,
  Repeated,
}

//
// FieldSpec
//

/// Definition of a single field or extension handed to [`SchemaBuilder`].
#[derive(Clone, Debug)]
pub struct FieldSpec {
  name: String,
  number: u32,
  field_type: FieldType,
  cardinality: Cardinality,
  packed: bool,
  default: Option<Value>,
}

impl FieldSpec {
  fn new(
    name: impl Into<String>,
    number: u32,
    field_type: FieldType,
    cardinality: Cardinality,
  ) -> Self {
    Self {
      name: name.into(),
      number,
      field_type,
      cardinality,
      packed: false,
      default: None,
    }
  }

  pub fn optional(name: impl Into<String>, number: u32, field_type: FieldType) -> Self {
    Self::new(name, number, field_type, Cardinality::Optional)
  }

  pub fn required(name: impl Into<String>, number: u32, field_type: FieldType) -> Self {
    Self::new(name, number, field_type, Cardinality::Required)
  }

  pub fn repeated(name: impl Into<String>, number: u32, field_type: FieldType) -> Self {
    Self::new(name, number, field_type, Cardinality::Repeated)
  }

  #[must_use]
  pub const fn packed(mut self) -> Self {
    self.packed = true;
    self
  }

  #[must_use]
  pub fn with_default(mut self, value: impl Into<Value>) -> Self {
    self.default = Some(value.into());
    self
  }
}

//
// Schema internals
//

struct MessageInfo {
  full_name: String,
  fields: BTreeMap<u32, usize>,
  fields_by_name: HashMap<String, usize>,
  extension_ranges: Vec<Range<u32>>,
  message_set_wire_format: bool,
  // Extensions declared inside this message's scope.
  nested_extensions: Vec<usize>,
}

struct EnumInfo {
  full_name: String,
  values: Vec<(String, i32)>,
}

struct FieldInfo {
  name: String,
  full_name: String,
  number: u32,
  field_type: FieldType,
  cardinality: Cardinality,
  packed: bool,
  default: Option<Value>,
  containing_type: MessageTypeId,
  extension_scope: Option<MessageTypeId>,
  is_extension: bool,
}

//
// Schema
//

/// An immutable, validated set of message and enum types. Always handled as `Arc<Schema>`.
pub struct Schema {
  messages: Vec<MessageInfo>,
  messages_by_name: HashMap<String, MessageTypeId>,
  enums: Vec<EnumInfo>,
  enums_by_name: HashMap<String, EnumTypeId>,
  fields: Vec<FieldInfo>,
  extensions_by_name: HashMap<String, usize>,
  default_instances: Vec<Arc<MessageData>>,
}

impl fmt::Debug for Schema {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Schema")
      .field("messages", &self.messages.len())
      .field("enums", &self.enums.len())
      .field("fields", &self.fields.len())
      .finish()
  }
}

impl Schema {
  pub fn message(self: &Arc<Self>, id: MessageTypeId) -> Option<MessageDescriptor> {
    (id.0 < self.messages.len()).then(|| MessageDescriptor {
      schema: self.clone(),
      id,
    })
  }

  pub fn message_by_name(self: &Arc<Self>, full_name: &str) -> Option<MessageDescriptor> {
    self
      .messages_by_name
      .get(full_name)
      .and_then(|id| self.message(*id))
  }

  pub fn enum_by_name(self: &Arc<Self>, full_name: &str) -> Option<EnumDescriptor> {
    self.enums_by_name.get(full_name).map(|id| EnumDescriptor {
      schema: self.clone(),
      id: *id,
    })
  }

  pub fn extension_by_name(self: &Arc<Self>, full_name: &str) -> Option<FieldDescriptor> {
    self
      .extensions_by_name
      .get(full_name)
      .map(|index| FieldDescriptor::new(self, *index))
  }

  /// Every extension declared in the schema, in declaration order.
  pub fn extensions(self: &Arc<Self>) -> impl Iterator<Item = FieldDescriptor> + '_ {
    self
      .fields
      .iter()
      .enumerate()
      .filter(|(_, field)| field.is_extension)
      .map(|(index, _)| FieldDescriptor::new(self, index))
  }

  /// The shared empty instance of a message type, created once when the schema was built.
  pub fn default_instance(self: &Arc<Self>, id: MessageTypeId) -> Option<Message> {
    let descriptor = self.message(id)?;
    Some(descriptor.default_instance())
  }

  pub(crate) fn default_instance_data(&self, id: MessageTypeId) -> &Arc<MessageData> {
    &self.default_instances[id.0]
  }
}

//
// MessageDescriptor
//

#[derive(Clone)]
pub struct MessageDescriptor {
  schema: Arc<Schema>,
  id: MessageTypeId,
}

impl PartialEq for MessageDescriptor {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id && Arc::ptr_eq(&self.schema, &other.schema)
  }
}

impl Eq for MessageDescriptor {}

impl fmt::Debug for MessageDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "MessageDescriptor({})", self.full_name())
  }
}

impl MessageDescriptor {
  fn info(&self) -> &MessageInfo {
    &self.schema.messages[self.id.0]
  }

  #[must_use]
  pub const fn id(&self) -> MessageTypeId {
    self.id
  }

  #[must_use]
  pub const fn schema(&self) -> &Arc<Schema> {
    &self.schema
  }

  #[must_use]
  pub fn full_name(&self) -> &str {
    &self.info().full_name
  }

  /// Last component of the full name.
  #[must_use]
  pub fn name(&self) -> &str {
    let full_name = self.full_name();
    full_name.rsplit('.').next().unwrap_or(full_name)
  }

  /// Regular (non extension) fields ordered by field number.
  pub fn fields(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
    self
      .info()
      .fields
      .values()
      .map(|index| FieldDescriptor::new(&self.schema, *index))
  }

  #[must_use]
  pub fn field_by_number(&self, number: u32) -> Option<FieldDescriptor> {
    self
      .info()
      .fields
      .get(&number)
      .map(|index| FieldDescriptor::new(&self.schema, *index))
  }

  #[must_use]
  pub fn field_by_name(&self, name: &str) -> Option<FieldDescriptor> {
    self
      .info()
      .fields_by_name
      .get(name)
      .map(|index| FieldDescriptor::new(&self.schema, *index))
  }

  #[must_use]
  pub fn extension_ranges(&self) -> &[Range<u32>] {
    &self.info().extension_ranges
  }

  #[must_use]
  pub fn is_extension_number(&self, number: u32) -> bool {
    self
      .info()
      .extension_ranges
      .iter()
      .any(|range| range.contains(&number))
  }

  #[must_use]
  pub fn is_message_set_wire_format(&self) -> bool {
    self.info().message_set_wire_format
  }

  /// Extensions declared inside this message's scope.
  pub fn nested_extensions(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
    self
      .info()
      .nested_extensions
      .iter()
      .map(|index| FieldDescriptor::new(&self.schema, *index))
  }

  #[must_use]
  pub fn default_instance(&self) -> Message {
    Message::from_parts(
      self.clone(),
      self.schema.default_instance_data(self.id).clone(),
    )
  }
}

//
// EnumDescriptor
//

#[derive(Clone)]
pub struct EnumDescriptor {
  schema: Arc<Schema>,
  id: EnumTypeId,
}

impl PartialEq for EnumDescriptor {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id && Arc::ptr_eq(&self.schema, &other.schema)
  }
}

impl Eq for EnumDescriptor {}

impl fmt::Debug for EnumDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "EnumDescriptor({})", self.full_name())
  }
}

impl EnumDescriptor {
  fn info(&self) -> &EnumInfo {
    &self.schema.enums[self.id.0]
  }

  #[must_use]
  pub const fn id(&self) -> EnumTypeId {
    self.id
  }

  #[must_use]
  pub fn full_name(&self) -> &str {
    &self.info().full_name
  }

  pub fn values(&self) -> impl Iterator<Item = (&str, i32)> + '_ {
    self
      .info()
      .values
      .iter()
      .map(|(name, number)| (name.as_str(), *number))
  }

  #[must_use]
  pub fn contains(&self, number: i32) -> bool {
    self.info().values.iter().any(|(_, n)| *n == number)
  }

  #[must_use]
  pub fn value_name(&self, number: i32) -> Option<&str> {
    self
      .info()
      .values
      .iter()
      .find(|(_, n)| *n == number)
      .map(|(name, _)| name.as_str())
  }

  #[must_use]
  pub fn value_by_name(&self, name: &str) -> Option<i32> {
    self
      .info()
      .values
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, number)| *number)
  }

  /// The first declared value, which is the default for fields without an explicit default.
  #[must_use]
  pub fn first_value(&self) -> i32 {
    self.info().values.first().map_or(0, |(_, number)| *number)
  }
}

//
// FieldDescriptor
//

#[derive(Clone)]
pub struct FieldDescriptor {
  schema: Arc<Schema>,
  index: usize,
}

impl PartialEq for FieldDescriptor {
  fn eq(&self, other: &Self) -> bool {
    self.index == other.index && Arc::ptr_eq(&self.schema, &other.schema)
  }
}

impl Eq for FieldDescriptor {}

impl fmt::Debug for FieldDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "FieldDescriptor({} = {})", self.full_name(), self.number())
  }
}

impl FieldDescriptor {
  fn new(schema: &Arc<Schema>, index: usize) -> Self {
    Self {
      schema: schema.clone(),
      index,
    }
  }

  fn info(&self) -> &FieldInfo {
    &self.schema.fields[self.index]
  }

  #[must_use]
  pub fn name(&self) -> &str {
    &self.info().name
  }

  #[must_use]
  pub fn full_name(&self) -> &str {
    &self.info().full_name
  }

  #[must_use]
  pub fn number(&self) -> u32 {
    self.info().number
  }

  #[must_use]
  pub fn field_type(&self) -> FieldType {
    self.info().field_type
  }

  #[must_use]
  pub fn cardinality(&self) -> Cardinality {
    self.info().cardinality
  }

  #[must_use]
  pub fn is_repeated(&self) -> bool {
    self.cardinality() == Cardinality::Repeated
  }

  #[must_use]
  pub fn is_required(&self) -> bool {
    self.cardinality() == Cardinality::Required
  }

  #[must_use]
  pub fn is_packed(&self) -> bool {
    self.info().packed
  }

  #[must_use]
  pub fn is_extension(&self) -> bool {
    self.info().is_extension
  }

  /// The message this field belongs to. For an extension this is the extended type.
  #[must_use]
  pub fn containing_type(&self) -> MessageDescriptor {
    MessageDescriptor {
      schema: self.schema.clone(),
      id: self.info().containing_type,
    }
  }

  /// For an extension, the message it was declared inside of, if any.
  #[must_use]
  pub fn extension_scope(&self) -> Option<MessageDescriptor> {
    self.info().extension_scope.map(|id| MessageDescriptor {
      schema: self.schema.clone(),
      id,
    })
  }

  #[must_use]
  pub fn message_type(&self) -> Option<MessageDescriptor> {
    self
      .field_type()
      .message_type()
      .map(|id| MessageDescriptor {
        schema: self.schema.clone(),
        id,
      })
  }

  #[must_use]
  pub fn enum_type(&self) -> Option<EnumDescriptor> {
    match self.field_type() {
      FieldType::Enum(id) => Some(EnumDescriptor {
        schema: self.schema.clone(),
        id,
      }),
      _ => None,
    }
  }

  /// Whether this extension is written in the MessageSet item encoding.
  #[must_use]
  pub fn is_message_set_item(&self) -> bool {
    self.is_extension()
      && matches!(self.field_type(), FieldType::Message(_))
      && !self.is_repeated()
      && self.containing_type().is_message_set_wire_format()
  }

  /// Value returned for an unset singular field: the declared default, otherwise the zero value
  /// of the type, the first enum value, or the message type's default instance.
  #[must_use]
  pub fn default_value(&self) -> Value {
    if let Some(default) = &self.info().default {
      return default.clone();
    }

    match self.field_type() {
      FieldType::Int32 | FieldType::SInt32 | FieldType::SFixed32 => Value::I32(0),
      FieldType::Int64 | FieldType::SInt64 | FieldType::SFixed64 => Value::I64(0),
      FieldType::UInt32 | FieldType::Fixed32 => Value::U32(0),
      FieldType::UInt64 | FieldType::Fixed64 => Value::U64(0),
      FieldType::Float => Value::F32(0.0),
      FieldType::Double => Value::F64(0.0),
      FieldType::Bool => Value::Bool(false),
      FieldType::String => Value::String(String::new()),
      FieldType::Bytes => Value::Bytes(bytes::Bytes::new()),
      FieldType::Enum(id) => Value::Enum(
        EnumDescriptor {
          schema: self.schema.clone(),
          id,
        }
        .first_value(),
      ),
      FieldType::Message(id) | FieldType::Group(id) => Value::Message(
        MessageDescriptor {
          schema: self.schema.clone(),
          id,
        }
        .default_instance(),
      ),
    }
  }
}

//
// SchemaBuilder
//

struct PendingField {
  owner: MessageTypeId,
  scope: Option<MessageTypeId>,
  spec: FieldSpec,
  is_extension: bool,
}

#[derive(Default)]
struct PendingMessage {
  full_name: String,
  extension_ranges: Vec<Range<u32>>,
  message_set_wire_format: bool,
}

/// Collects type definitions. Message types are declared up front and referenced by
/// [`MessageTypeId`], so a field may refer to a type whose own fields are added later.
#[derive(Default)]
pub struct SchemaBuilder {
  messages: Vec<PendingMessage>,
  enums: Vec<EnumInfo>,
  fields: Vec<PendingField>,
}

impl SchemaBuilder {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  pub fn declare_message(&mut self, full_name: impl Into<String>) -> MessageTypeId {
    self.messages.push(PendingMessage {
      full_name: full_name.into(),
      ..Default::default()
    });
    MessageTypeId(self.messages.len() - 1)
  }

  pub fn add_enum(&mut self, full_name: impl Into<String>, values: &[(&str, i32)]) -> EnumTypeId {
    self.enums.push(EnumInfo {
      full_name: full_name.into(),
      values: values
        .iter()
        .map(|(name, number)| ((*name).to_string(), *number))
        .collect(),
    });
    EnumTypeId(self.enums.len() - 1)
  }

  pub fn add_field(&mut self, message: MessageTypeId, spec: FieldSpec) -> &mut Self {
    self.fields.push(PendingField {
      owner: message,
      scope: None,
      spec,
      is_extension: false,
    });
    self
  }

  /// Declares `range` (end exclusive) as available to extensions of `message`.
  pub fn add_extension_range(&mut self, message: MessageTypeId, range: Range<u32>) -> &mut Self {
    if let Some(pending) = self.messages.get_mut(message.0) {
      pending.extension_ranges.push(range);
    }
    self
  }

  pub fn set_message_set_wire_format(&mut self, message: MessageTypeId, enabled: bool) -> &mut Self {
    if let Some(pending) = self.messages.get_mut(message.0) {
      pending.message_set_wire_format = enabled;
    }
    self
  }

  /// Adds an extension of `extendee`. With a `scope` the extension's full name is nested inside
  /// that message, otherwise `spec`'s name is taken as already fully qualified.
  pub fn add_extension(
    &mut self,
    extendee: MessageTypeId,
    scope: Option<MessageTypeId>,
    spec: FieldSpec,
  ) -> &mut Self {
    self.fields.push(PendingField {
      owner: extendee,
      scope,
      spec,
      is_extension: true,
    });
    self
  }

  /// Validates every definition and creates the default instance of each message type.
  pub fn build(self) -> Result<Arc<Schema>> {
    let invalid = |message: String| Err(Error::InvalidSchema(message));

    let mut messages_by_name = HashMap::new();
    for (index, message) in self.messages.iter().enumerate() {
      if messages_by_name
        .insert(message.full_name.clone(), MessageTypeId(index))
        .is_some()
      {
        return invalid(format!("duplicate message type {}", message.full_name));
      }
      for range in &message.extension_ranges {
        if range.start == 0 || range.start >= range.end || range.end > MAX_FIELD_NUMBER + 1 {
          return invalid(format!(
            "invalid extension range {range:?} in {}",
            message.full_name
          ));
        }
      }
    }

    let mut enums_by_name = HashMap::new();
    for (index, enum_info) in self.enums.iter().enumerate() {
      if enum_info.values.is_empty() {
        return invalid(format!("enum {} declares no values", enum_info.full_name));
      }
      if enums_by_name
        .insert(enum_info.full_name.clone(), EnumTypeId(index))
        .is_some()
      {
        return invalid(format!("duplicate enum type {}", enum_info.full_name));
      }
    }

    let mut message_infos: Vec<MessageInfo> = self
      .messages
      .into_iter()
      .map(|message| MessageInfo {
        full_name: message.full_name,
        fields: BTreeMap::new(),
        fields_by_name: HashMap::new(),
        extension_ranges: message.extension_ranges,
        message_set_wire_format: message.message_set_wire_format,
        nested_extensions: Vec::new(),
      })
      .collect();

    let mut fields = Vec::with_capacity(self.fields.len());
    let mut extensions_by_name = HashMap::new();
    let mut extension_numbers = HashMap::new();
    for (index, pending) in self.fields.into_iter().enumerate() {
      let Some(owner) = message_infos.get(pending.owner.0) else {
        return invalid(format!("field {} refers to an unknown message", pending.spec.name));
      };
      let spec = &pending.spec;

      let full_name = match pending.scope {
        Some(scope) => match message_infos.get(scope.0) {
          Some(scope) => format!("{}.{}", scope.full_name, spec.name),
          None => return invalid(format!("extension {} has an unknown scope", spec.name)),
        },
        None if pending.is_extension => spec.name.clone(),
        None => format!("{}.{}", owner.full_name, spec.name),
      };

      if spec.number == 0 || spec.number > MAX_FIELD_NUMBER {
        return invalid(format!("field {full_name} has invalid number {}", spec.number));
      }
      validate_field_type(&full_name, spec, message_infos.len(), &self.enums)?;

      let in_extension_range = owner
        .extension_ranges
        .iter()
        .any(|range| range.contains(&spec.number));
      if pending.is_extension {
        if !in_extension_range {
          return invalid(format!(
            "extension {full_name} number {} is outside the extension ranges of {}",
            spec.number, owner.full_name
          ));
        }
        if spec.cardinality == Cardinality::Required {
          return invalid(format!("extension {full_name} may not be required"));
        }
        if owner.message_set_wire_format
          && (!matches!(spec.field_type, FieldType::Message(_))
            || spec.cardinality == Cardinality::Repeated)
        {
          return invalid(format!(
            "extension {full_name} of MessageSet {} must be an optional message",
            owner.full_name
          ));
        }
        if extension_numbers
          .insert((pending.owner, spec.number), full_name.clone())
          .is_some()
        {
          return invalid(format!(
            "extension number {} of {} is used twice",
            spec.number, owner.full_name
          ));
        }
        if extensions_by_name.insert(full_name.clone(), index).is_some() {
          return invalid(format!("duplicate extension {full_name}"));
        }
      } else {
        if in_extension_range {
          return invalid(format!(
            "field {full_name} number {} overlaps an extension range",
            spec.number
          ));
        }
        if owner.message_set_wire_format {
          return invalid(format!(
            "MessageSet {} may not declare regular fields",
            owner.full_name
          ));
        }
      }

      let owner = &mut message_infos[pending.owner.0];
      if pending.is_extension {
        if let Some(scope) = pending.scope {
          message_infos[scope.0].nested_extensions.push(index);
        }
      } else {
        if owner.fields.insert(spec.number, index).is_some() {
          return invalid(format!("field number {} is used twice in {}", spec.number, owner.full_name));
        }
        if owner.fields_by_name.insert(spec.name.clone(), index).is_some() {
          return invalid(format!("field name {} is used twice in {}", spec.name, owner.full_name));
        }
      }

      let FieldSpec {
        name,
        number,
        field_type,
        cardinality,
        packed,
        default,
      } = pending.spec;
      fields.push(FieldInfo {
        name,
        full_name,
        number,
        field_type,
        cardinality,
        packed,
        default,
        containing_type: pending.owner,
        extension_scope: pending.scope,
        is_extension: pending.is_extension,
      });
    }

    let default_instances = (0 .. message_infos.len())
      .map(|_| Arc::new(MessageData::empty()))
      .collect();

    log::debug!(
      "built schema with {} message types, {} enums and {} fields",
      message_infos.len(),
      self.enums.len(),
      fields.len()
    );

    Ok(Arc::new(Schema {
      messages: message_infos,
      messages_by_name,
      enums: self.enums,
      enums_by_name,
      fields,
      extensions_by_name,
      default_instances,
    }))
  }
}

fn validate_field_type(
  full_name: &str,
  spec: &FieldSpec,
  message_count: usize,
  enums: &[EnumInfo],
) -> Result<()> {
  let invalid = |message: String| Err(Error::InvalidSchema(message));

  match spec.field_type {
    FieldType::Message(id) | FieldType::Group(id) if id.0 >= message_count => {
      return invalid(format!("field {full_name} refers to an unknown message type"));
    },
    FieldType::Enum(id) if id.0 >= enums.len() => {
      return invalid(format!("field {full_name} refers to an unknown enum type"));
    },
    _ => {},
  }

  if spec.packed && (spec.cardinality != Cardinality::Repeated || !spec.field_type.is_packable()) {
    return invalid(format!(
      "field {full_name} is packed but is not a repeated scalar"
    ));
  }

  if let Some(default) = &spec.default {
    if spec.cardinality == Cardinality::Repeated || spec.field_type.message_type().is_some() {
      return invalid(format!("field {full_name} may not declare a default"));
    }
    if !default.matches_type(spec.field_type) {
      return invalid(format!(
        "default of field {full_name} is a {} but the field is a {}",
        default.type_name(),
        spec.field_type.mapped_type_name()
      ));
    }
    if let (FieldType::Enum(id), Value::Enum(number)) = (spec.field_type, default)
      && !enums[id.0].values.iter().any(|(_, n)| n == number)
    {
      return invalid(format!(
        "default of field {full_name} is not a value of {}",
        enums[id.0].full_name
      ));
    }
  }

  Ok(())
}
