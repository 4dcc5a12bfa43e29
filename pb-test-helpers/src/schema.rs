// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

//! Message types shared by tests, benches and fuzz targets.

use bytes::Bytes;
use pb_message::descriptor::MessageTypeId;
use pb_message::{
  Builder,
  ExtensionRegistry,
  FieldDescriptor,
  FieldSpec,
  FieldType,
  Message,
  MessageDescriptor,
  Schema,
  SchemaBuilder,
  Value,
};
use std::sync::{Arc, LazyLock};

// Exclusive end of an extension range covering every remaining field number.
pub const MAX_EXTENSION_NUMBER: u32 = pb_wire::tag::MAX_FIELD_NUMBER + 1;

pub const MESSAGE_SET_EXTENSION1_NUMBER: u32 = 1_545_008;
pub const MESSAGE_SET_EXTENSION2_NUMBER: u32 = 1_547_769;

static TEST_SCHEMA: LazyLock<TestSchema> = LazyLock::new(TestSchema::build);

#[must_use]
pub fn test_schema() -> &'static TestSchema {
  &TEST_SCHEMA
}

/// Looks up a field by name, panicking if the message does not declare it.
#[must_use]
pub fn field(message: &MessageDescriptor, name: &str) -> FieldDescriptor {
  message
    .field_by_name(name)
    .unwrap_or_else(|| panic!("{} has no field {name}", message.full_name()))
}

//
// TestSchema
//

pub struct TestSchema {
  pub schema: Arc<Schema>,
}

impl TestSchema {
  #[must_use]
  pub fn message(&self, full_name: &str) -> MessageDescriptor {
    self
      .schema
      .message_by_name(full_name)
      .unwrap_or_else(|| panic!("unknown message type {full_name}"))
  }

  #[must_use]
  pub fn extension(&self, full_name: &str) -> FieldDescriptor {
    self
      .schema
      .extension_by_name(full_name)
      .unwrap_or_else(|| panic!("unknown extension {full_name}"))
  }

  #[must_use]
  pub fn test_all_types(&self) -> MessageDescriptor {
    self.message("test.TestAllTypes")
  }

  #[must_use]
  pub fn nested_message(&self) -> MessageDescriptor {
    self.message("test.TestAllTypes.NestedMessage")
  }

  #[must_use]
  pub fn foreign_message(&self) -> MessageDescriptor {
    self.message("test.ForeignMessage")
  }

  #[must_use]
  pub fn test_required(&self) -> MessageDescriptor {
    self.message("test.TestRequired")
  }

  #[must_use]
  pub fn test_required_foreign(&self) -> MessageDescriptor {
    self.message("test.TestRequiredForeign")
  }

  #[must_use]
  pub fn test_recursive(&self) -> MessageDescriptor {
    self.message("test.TestRecursive")
  }

  #[must_use]
  pub fn test_extendable(&self) -> MessageDescriptor {
    self.message("test.TestExtendable")
  }

  #[must_use]
  pub fn test_message_set(&self) -> MessageDescriptor {
    self.message("test.TestMessageSet")
  }

  #[must_use]
  pub fn test_empty_message(&self) -> MessageDescriptor {
    self.message("test.TestEmptyMessage")
  }

  /// A registry holding every extension of the test schema.
  #[must_use]
  pub fn registry(&self) -> ExtensionRegistry {
    let registry = ExtensionRegistry::new();
    for extension in self.schema.extensions() {
      registry
        .add_descriptor(&extension)
        .unwrap_or_else(|e| panic!("failed to register {}: {e}", extension.full_name()));
    }
    registry
  }

  fn build() -> Self {
    let mut builder = SchemaBuilder::new();

    let foreign_enum = builder.add_enum(
      "test.ForeignEnum",
      &[("FOREIGN_FOO", 4), ("FOREIGN_BAR", 5), ("FOREIGN_BAZ", 6)],
    );
    let nested_enum = builder.add_enum(
      "test.TestAllTypes.NestedEnum",
      &[("FOO", 1), ("BAR", 2), ("BAZ", 3), ("NEG", -1)],
    );

    let foreign_message = builder.declare_message("test.ForeignMessage");
    let all_types = builder.declare_message("test.TestAllTypes");
    let nested_message = builder.declare_message("test.TestAllTypes.NestedMessage");
    let optional_group = builder.declare_message("test.TestAllTypes.OptionalGroup");
    let repeated_group = builder.declare_message("test.TestAllTypes.RepeatedGroup");
    let required = builder.declare_message("test.TestRequired");
    let required_foreign = builder.declare_message("test.TestRequiredForeign");
    let recursive = builder.declare_message("test.TestRecursive");
    let extendable = builder.declare_message("test.TestExtendable");
    let nested_extension = builder.declare_message("test.TestNestedExtension");
    let message_set = builder.declare_message("test.TestMessageSet");
    let message_set_extension1 = builder.declare_message("test.TestMessageSetExtension1");
    let message_set_extension2 = builder.declare_message("test.TestMessageSetExtension2");
    let message_set_container = builder.declare_message("test.TestMessageSetContainer");
    builder.declare_message("test.TestEmptyMessage");

    builder
      .add_field(foreign_message, FieldSpec::optional("c", 1, FieldType::Int32))
      .add_field(foreign_message, FieldSpec::optional("d", 2, FieldType::Int32))
      .add_field(nested_message, FieldSpec::optional("bb", 1, FieldType::Int32))
      .add_field(optional_group, FieldSpec::optional("a", 17, FieldType::Int32))
      .add_field(repeated_group, FieldSpec::optional("a", 47, FieldType::Int32));

    add_all_types_fields(
      &mut builder,
      all_types,
      &AllTypesRefs {
        nested_message,
        foreign_message,
        optional_group,
        repeated_group,
        nested_enum: FieldType::Enum(nested_enum),
        foreign_enum: FieldType::Enum(foreign_enum),
      },
    );

    builder
      .add_field(required, FieldSpec::required("a", 1, FieldType::Int32))
      .add_field(required, FieldSpec::optional("b", 2, FieldType::Int32))
      .add_field(required, FieldSpec::required("c", 3, FieldType::Int32))
      .add_field(
        required_foreign,
        FieldSpec::optional("optional_message", 1, FieldType::Message(required)),
      )
      .add_field(
        required_foreign,
        FieldSpec::repeated("repeated_message", 2, FieldType::Message(required)),
      )
      .add_field(required_foreign, FieldSpec::optional("dummy", 3, FieldType::Int32))
      .add_field(recursive, FieldSpec::optional("child", 1, FieldType::Message(recursive)))
      .add_field(recursive, FieldSpec::optional("value", 2, FieldType::Int32));

    builder
      .add_field(extendable, FieldSpec::optional("regular", 1, FieldType::Int32))
      .add_extension_range(extendable, 100 .. 200)
      .add_extension(
        extendable,
        None,
        FieldSpec::optional("test.ext_int32", 100, FieldType::Int32),
      )
      .add_extension(
        extendable,
        None,
        FieldSpec::optional("test.ext_message", 101, FieldType::Message(foreign_message)),
      )
      .add_extension(
        extendable,
        None,
        FieldSpec::repeated("test.ext_repeated_string", 102, FieldType::String),
      )
      .add_extension(
        extendable,
        None,
        FieldSpec::repeated("test.ext_packed_sint32", 103, FieldType::SInt32).packed(),
      )
      .add_extension(
        extendable,
        Some(nested_extension),
        FieldSpec::optional("nested", 104, FieldType::String).with_default("nested default"),
      );

    builder
      .set_message_set_wire_format(message_set, true)
      .add_extension_range(message_set, 4 .. MAX_EXTENSION_NUMBER)
      .add_field(message_set_extension1, FieldSpec::optional("i", 15, FieldType::Int32))
      .add_field(message_set_extension2, FieldSpec::optional("str", 25, FieldType::String))
      .add_extension(
        message_set,
        Some(message_set_extension1),
        FieldSpec::optional(
          "message_set_extension",
          MESSAGE_SET_EXTENSION1_NUMBER,
          FieldType::Message(message_set_extension1),
        ),
      )
      .add_extension(
        message_set,
        Some(message_set_extension2),
        FieldSpec::optional(
          "message_set_extension",
          MESSAGE_SET_EXTENSION2_NUMBER,
          FieldType::Message(message_set_extension2),
        ),
      )
      .add_field(
        message_set_container,
        FieldSpec::optional("message_set", 1, FieldType::Message(message_set)),
      );

    let schema = builder
      .build()
      .unwrap_or_else(|e| panic!("invalid test schema: {e}"));
    Self { schema }
  }
}

struct AllTypesRefs {
  nested_message: MessageTypeId,
  foreign_message: MessageTypeId,
  optional_group: MessageTypeId,
  repeated_group: MessageTypeId,
  nested_enum: FieldType,
  foreign_enum: FieldType,
}

const SCALARS: [(&str, FieldType); 15] = [
  ("int32", FieldType::Int32),
  ("int64", FieldType::Int64),
  ("uint32", FieldType::UInt32),
  ("uint64", FieldType::UInt64),
  ("sint32", FieldType::SInt32),
  ("sint64", FieldType::SInt64),
  ("fixed32", FieldType::Fixed32),
  ("fixed64", FieldType::Fixed64),
  ("sfixed32", FieldType::SFixed32),
  ("sfixed64", FieldType::SFixed64),
  ("float", FieldType::Float),
  ("double", FieldType::Double),
  ("bool", FieldType::Bool),
  ("string", FieldType::String),
  ("bytes", FieldType::Bytes),
];

fn add_all_types_fields(builder: &mut SchemaBuilder, all_types: MessageTypeId, refs: &AllTypesRefs) {
  for ((name, field_type), number) in SCALARS.iter().zip(1 ..) {
    builder.add_field(
      all_types,
      FieldSpec::optional(format!("optional_{name}"), number, *field_type),
    );
    builder.add_field(
      all_types,
      FieldSpec::repeated(format!("repeated_{name}"), number + 30, *field_type),
    );
  }

  builder
    .add_field(
      all_types,
      FieldSpec::optional("optionalgroup", 16, FieldType::Group(refs.optional_group)),
    )
    .add_field(
      all_types,
      FieldSpec::optional(
        "optional_nested_message",
        18,
        FieldType::Message(refs.nested_message),
      ),
    )
    .add_field(
      all_types,
      FieldSpec::optional(
        "optional_foreign_message",
        19,
        FieldType::Message(refs.foreign_message),
      ),
    )
    .add_field(
      all_types,
      FieldSpec::optional("optional_nested_enum", 21, refs.nested_enum),
    )
    .add_field(
      all_types,
      FieldSpec::optional("optional_foreign_enum", 22, refs.foreign_enum),
    )
    .add_field(
      all_types,
      FieldSpec::repeated("repeatedgroup", 46, FieldType::Group(refs.repeated_group)),
    )
    .add_field(
      all_types,
      FieldSpec::repeated(
        "repeated_nested_message",
        48,
        FieldType::Message(refs.nested_message),
      ),
    )
    .add_field(
      all_types,
      FieldSpec::repeated(
        "repeated_foreign_message",
        49,
        FieldType::Message(refs.foreign_message),
      ),
    )
    .add_field(
      all_types,
      FieldSpec::repeated("repeated_nested_enum", 51, refs.nested_enum),
    )
    .add_field(
      all_types,
      FieldSpec::repeated("repeated_foreign_enum", 52, refs.foreign_enum),
    )
    .add_field(
      all_types,
      FieldSpec::optional("default_int32", 61, FieldType::Int32).with_default(41i32),
    )
    .add_field(
      all_types,
      FieldSpec::optional("default_string", 64, FieldType::String).with_default("hello"),
    )
    .add_field(
      all_types,
      FieldSpec::optional("default_nested_enum", 74, refs.nested_enum)
        .with_default(Value::Enum(2)),
    )
    .add_field(
      all_types,
      FieldSpec::repeated("packed_int32", 90, FieldType::Int32).packed(),
    )
    .add_field(
      all_types,
      FieldSpec::repeated("packed_sint64", 91, FieldType::SInt64).packed(),
    )
    .add_field(
      all_types,
      FieldSpec::repeated("packed_fixed32", 92, FieldType::Fixed32).packed(),
    )
    .add_field(
      all_types,
      FieldSpec::repeated("packed_double", 93, FieldType::Double).packed(),
    )
    .add_field(
      all_types,
      FieldSpec::repeated("packed_foreign_enum", 94, refs.foreign_enum).packed(),
    );
}

/// A `test.TestAllTypes` with every optional and repeated field set to a fixed value.
#[must_use]
pub fn all_fields_set() -> Message {
  let schema = test_schema();
  let all_types = schema.test_all_types();
  let mut builder = Builder::new(&all_types);

  let scalar_values = |offset: i32| -> [Value; 15] {
    [
      Value::I32(101 + offset),
      Value::I64(102 + i64::from(offset)),
      Value::U32(103 + offset.unsigned_abs()),
      Value::U64(104 + u64::from(offset.unsigned_abs())),
      Value::I32(-105 - offset),
      Value::I64(-106 - i64::from(offset)),
      Value::U32(107 + offset.unsigned_abs()),
      Value::U64(108 + u64::from(offset.unsigned_abs())),
      Value::I32(-109 - offset),
      Value::I64(-110 - i64::from(offset)),
      Value::F32(111.5),
      Value::F64(-112.25),
      Value::Bool(offset % 2 == 0),
      Value::String(format!("string {offset}")),
      Value::Bytes(Bytes::from(format!("bytes {offset}"))),
    ]
  };

  for ((name, _), value) in SCALARS.iter().zip(scalar_values(0)) {
    builder
      .set_field(&field(&all_types, &format!("optional_{name}")), value)
      .unwrap();
  }
  for offset in [200, 300] {
    for ((name, _), value) in SCALARS.iter().zip(scalar_values(offset)) {
      builder
        .add_repeated_field(&field(&all_types, &format!("repeated_{name}")), value)
        .unwrap();
    }
  }

  let group = |name: &str, a: i32| -> Message {
    let descriptor = field(&all_types, name).message_type().unwrap();
    let mut group = Builder::new(&descriptor);
    group.set_field(&field(&descriptor, "a"), a).unwrap();
    group.build().unwrap()
  };
  let nested = |bb: i32| -> Message {
    let descriptor = schema.nested_message();
    let mut nested = Builder::new(&descriptor);
    nested.set_field(&field(&descriptor, "bb"), bb).unwrap();
    nested.build().unwrap()
  };
  let foreign = |c: i32| -> Message {
    let descriptor = schema.foreign_message();
    let mut foreign = Builder::new(&descriptor);
    foreign.set_field(&field(&descriptor, "c"), c).unwrap();
    foreign.build().unwrap()
  };

  builder
    .set_field(&field(&all_types, "optionalgroup"), group("optionalgroup", 117))
    .unwrap()
    .set_field(&field(&all_types, "optional_nested_message"), nested(118))
    .unwrap()
    .set_field(&field(&all_types, "optional_foreign_message"), foreign(119))
    .unwrap()
    .set_field(&field(&all_types, "optional_nested_enum"), Value::Enum(3))
    .unwrap()
    .set_field(&field(&all_types, "optional_foreign_enum"), Value::Enum(6))
    .unwrap();

  for (i, offset) in [200, 300].into_iter().enumerate() {
    builder
      .add_repeated_field(&field(&all_types, "repeatedgroup"), group("repeatedgroup", 247 + offset))
      .unwrap()
      .add_repeated_field(&field(&all_types, "repeated_nested_message"), nested(248 + offset))
      .unwrap()
      .add_repeated_field(&field(&all_types, "repeated_foreign_message"), foreign(249 + offset))
      .unwrap()
      .add_repeated_field(
        &field(&all_types, "repeated_nested_enum"),
        Value::Enum(if i == 0 { 2 } else { -1 }),
      )
      .unwrap()
      .add_repeated_field(&field(&all_types, "repeated_foreign_enum"), Value::Enum(5))
      .unwrap();
  }

  builder
    .set_field(&field(&all_types, "default_int32"), 401i32)
    .unwrap()
    .set_field(&field(&all_types, "default_string"), "goodbye")
    .unwrap()
    .set_field(&field(&all_types, "default_nested_enum"), Value::Enum(1))
    .unwrap();

  for value in [601i32, -602] {
    builder
      .add_repeated_field(&field(&all_types, "packed_int32"), value)
      .unwrap()
      .add_repeated_field(&field(&all_types, "packed_sint64"), i64::from(value))
      .unwrap()
      .add_repeated_field(&field(&all_types, "packed_fixed32"), value.unsigned_abs())
      .unwrap()
      .add_repeated_field(&field(&all_types, "packed_double"), f64::from(value) / 4.0)
      .unwrap()
      .add_repeated_field(&field(&all_types, "packed_foreign_enum"), Value::Enum(4))
      .unwrap();
  }

  builder.build().unwrap()
}
