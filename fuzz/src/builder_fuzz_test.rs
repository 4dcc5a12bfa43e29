// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use arbitrary::Arbitrary;
use pb_message::{Builder, FieldDescriptor, Message, UnknownFieldSet, Value};
use pb_test_helpers::schema::{field, test_schema};

// Merging a message into itself doubles it, so merges stop once it gets this large.
const MAX_MERGE_SIZE: usize = 64 * 1024;

#[derive(Arbitrary, Debug)]
pub enum Operation {
  SetInt32(i32),
  SetSInt64(i64),
  SetString(String),
  AddRepeatedUInt32(u32),
  AddRepeatedBytes(Vec<u8>),
  AddPackedInt32(i32),
  SetNestedMessage(i32),
  AddForeignMessage(Option<i32>, Option<i32>),
  SetForeignEnum(u8),
  SetRepeatedUInt32(u8, u32),
  AddUnknownVarint(u16, u64),
  ClearField(u8),
  MergeSelf,
  Rebuild,
}

#[derive(Arbitrary, Debug)]
pub struct BuilderFuzzTestCase {
  operations: Vec<Operation>,
}

struct BuilderFuzzTest {
  builder: Builder,
}

impl BuilderFuzzTest {
  fn new() -> Self {
    Self {
      builder: Builder::new(&test_schema().test_all_types()),
    }
  }

  fn field(&self, name: &str) -> FieldDescriptor {
    field(self.builder.descriptor(), name)
  }

  fn message(&self, name: &str, field_name: &str, value: Option<i32>) -> Message {
    let descriptor = test_schema().message(name);
    let mut builder = Builder::new(&descriptor);
    if let Some(value) = value {
      builder
        .set_field(&field(&descriptor, field_name), value)
        .unwrap();
    }
    builder.build().unwrap()
  }

  // Replaces the builder with a fresh one seeded from what has been built so far.
  fn rebuild(&mut self, merge_self: bool) {
    let message = self.builder.build_partial().unwrap();
    self.builder = message.to_builder();
    if merge_self && message.serialized_size() < MAX_MERGE_SIZE {
      self.builder.merge_from(&message).unwrap();
    }
  }

  fn apply(&mut self, operation: &Operation) {
    log::trace!("builder fuzz operation: {operation:?}");
    match operation {
      Operation::SetInt32(value) => {
        let field = self.field("optional_int32");
        self.builder.set_field(&field, *value).unwrap();
      },
      Operation::SetSInt64(value) => {
        let field = self.field("optional_sint64");
        self.builder.set_field(&field, *value).unwrap();
      },
      Operation::SetString(value) => {
        let field = self.field("optional_string");
        self.builder.set_field(&field, value.clone()).unwrap();
      },
      Operation::AddRepeatedUInt32(value) => {
        let field = self.field("repeated_uint32");
        self.builder.add_repeated_field(&field, *value).unwrap();
      },
      Operation::AddRepeatedBytes(value) => {
        let field = self.field("repeated_bytes");
        self.builder.add_repeated_field(&field, value.clone()).unwrap();
      },
      Operation::AddPackedInt32(value) => {
        let field = self.field("packed_int32");
        self.builder.add_repeated_field(&field, *value).unwrap();
      },
      Operation::SetNestedMessage(bb) => {
        let field = self.field("optional_nested_message");
        let nested = self.message("test.TestAllTypes.NestedMessage", "bb", Some(*bb));
        self.builder.set_field(&field, nested).unwrap();
      },
      Operation::AddForeignMessage(c, d) => {
        let field = self.field("repeated_foreign_message");
        let mut foreign = self.message("test.ForeignMessage", "c", *c).to_builder();
        if let Some(d) = d {
          foreign
            .set_field(&field.message_type().unwrap().field_by_name("d").unwrap(), *d)
            .unwrap();
        }
        self
          .builder
          .add_repeated_field(&field, foreign.build().unwrap())
          .unwrap();
      },
      Operation::SetForeignEnum(value) => {
        let field = self.field("optional_foreign_enum");
        self
          .builder
          .set_field(&field, Value::Enum(4 + i32::from(*value % 3)))
          .unwrap();
      },
      Operation::SetRepeatedUInt32(index, value) => {
        let field = self.field("repeated_uint32");
        let count = self.builder.repeated_count(&field).unwrap();
        if count > 0 {
          self
            .builder
            .set_repeated_field(&field, usize::from(*index) % count, *value)
            .unwrap();
        }
      },
      Operation::AddUnknownVarint(number, value) => {
        let mut unknown = UnknownFieldSet::new().to_builder();
        unknown
          .merge_varint_field(1000 + u32::from(*number) % 1000, *value)
          .unwrap();
        self.builder.merge_unknown_fields(&unknown.build()).unwrap();
      },
      Operation::ClearField(index) => {
        let descriptor = self.builder.descriptor().clone();
        let count = descriptor.fields().count();
        let field = descriptor.fields().nth(usize::from(*index) % count).unwrap();
        self.builder.clear_field(&field).unwrap();
      },
      Operation::MergeSelf => self.rebuild(true),
      Operation::Rebuild => self.rebuild(false),
    }
  }
}

/// Applies arbitrary builder operations to a `TestAllTypes`. The result must encode to its
/// computed size and parse back to an equal message.
pub fn run(test_case: &BuilderFuzzTestCase) {
  let mut test = BuilderFuzzTest::new();
  for operation in &test_case.operations {
    test.apply(operation);
  }

  let message = test.builder.build_partial().unwrap();
  let encoded = message.to_bytes().unwrap();
  assert_eq!(encoded.len(), message.serialized_size());

  let schema = test_schema();
  let parsed =
    Message::parse_partial_from(message.descriptor(), &encoded, &schema.registry()).unwrap();
  assert_eq!(parsed, message);
  assert_eq!(message.to_builder().build_partial().unwrap(), message);
}

#[test]
fn run_sample_inputs() {
  crate::run_all_inputs(crate::sample_inputs(), |test_case: BuilderFuzzTestCase| {
    run(&test_case);
  });
}

#[test]
fn merge_self_doubles_repeated_fields() {
  run(&BuilderFuzzTestCase {
    operations: vec![
      Operation::AddRepeatedUInt32(1),
      Operation::AddPackedInt32(-1),
      Operation::SetNestedMessage(3),
      Operation::AddUnknownVarint(5, 9),
      Operation::MergeSelf,
      Operation::SetRepeatedUInt32(1, 2),
      Operation::ClearField(0),
      Operation::Rebuild,
    ],
  });
}
