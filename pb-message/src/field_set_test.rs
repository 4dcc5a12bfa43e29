// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#![allow(clippy::unwrap_used)]

use super::*;
use crate::descriptor::{FieldSpec, MessageDescriptor, SchemaBuilder};
use crate::message::Builder;
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

#[ctor::ctor]
fn test_global_init() {
  pb_test_helpers::test_global_init();
}

struct Setup {
  message: MessageDescriptor,
  other: MessageDescriptor,
}

impl Setup {
  fn new() -> Self {
    let mut builder = SchemaBuilder::new();
    let color = builder.add_enum("m.Color", &[("RED", 1), ("BLUE", 2)]);
    let message = builder.declare_message("m.M");
    let other = builder.declare_message("m.Other");
    builder
      .add_field(message, FieldSpec::optional("i", 1, FieldType::Int32))
      .add_field(message, FieldSpec::optional("s", 2, FieldType::String).with_default("d"))
      .add_field(message, FieldSpec::repeated("r", 3, FieldType::SInt32))
      .add_field(message, FieldSpec::optional("e", 4, FieldType::Enum(color)))
      .add_field(message, FieldSpec::optional("child", 5, FieldType::Message(message)))
      .add_field(message, FieldSpec::repeated("kids", 6, FieldType::Message(message)))
      .add_field(message, FieldSpec::required("req", 7, FieldType::Int32))
      .add_field(other, FieldSpec::optional("x", 1, FieldType::Int32));
    let schema = builder.build().unwrap();
    Self {
      message: schema.message_by_name("m.M").unwrap(),
      other: schema.message_by_name("m.Other").unwrap(),
    }
  }

  fn field(&self, name: &str) -> FieldDescriptor {
    self.message.field_by_name(name).unwrap()
  }

  fn child(&self, i: i32) -> Message {
    let mut builder = Builder::new(&self.message);
    builder.set_field(&self.field("i"), i).unwrap();
    builder.build_partial().unwrap()
  }
}

#[test]
fn get_returns_defaults() {
  let setup = Setup::new();
  let set = FieldSet::new();

  assert_eq!(
    set.get(&setup.field("i")).into_owned(),
    FieldValue::Single(Value::I32(0))
  );
  assert_eq!(
    set.get(&setup.field("s")).into_owned(),
    FieldValue::Single(Value::String("d".to_string()))
  );
  assert_eq!(
    set.get(&setup.field("e")).into_owned(),
    FieldValue::Single(Value::Enum(1))
  );
  assert_eq!(
    set.get(&setup.field("r")).into_owned(),
    FieldValue::Repeated(Vec::new())
  );
  assert!(!set.has(&setup.field("i")).unwrap());
}

#[test]
fn set_and_clear() {
  let setup = Setup::new();
  let mut set = FieldSet::new();
  let i = setup.field("i");

  set.set(&i, FieldValue::Single(Value::I32(5))).unwrap();
  assert!(set.has(&i).unwrap());
  assert_eq!(set.get(&i).into_owned(), FieldValue::Single(Value::I32(5)));
  assert_eq!(set.len(), 1);

  set.clear(&i).unwrap();
  assert!(!set.has(&i).unwrap());
  assert!(set.is_empty());
}

#[test]
fn type_and_cardinality_checks() {
  let setup = Setup::new();
  let mut set = FieldSet::new();

  assert_matches!(
    set.set(&setup.field("i"), FieldValue::Single(Value::I64(1))),
    Err(Error::TypeMismatch { field, actual, .. }) => {
      assert_eq!(field, "m.M.i");
      assert_eq!(actual, "int64");
    }
  );
  assert_matches!(
    set.set(&setup.field("e"), FieldValue::Single(Value::Enum(9))),
    Err(Error::TypeMismatch { actual, .. }) => assert_eq!(actual, "undeclared enum value 9")
  );
  let other = Builder::new(&setup.other).build_partial().unwrap();
  assert_matches!(
    set.set(&setup.field("child"), FieldValue::Single(Value::Message(other))),
    Err(Error::TypeMismatch { actual, .. }) => assert_eq!(actual, "m.Other")
  );
  assert_matches!(
    set.set(&setup.field("r"), FieldValue::Single(Value::I32(1))),
    Err(Error::FieldCardinality(_))
  );
  assert_matches!(
    set.set(&setup.field("i"), FieldValue::Repeated(vec![Value::I32(1)])),
    Err(Error::FieldCardinality(_))
  );
  assert_matches!(
    set.add_repeated(&setup.field("i"), Value::I32(1)),
    Err(Error::FieldCardinality(_))
  );
  assert_matches!(
    set.repeated_count(&setup.field("i")),
    Err(Error::FieldCardinality(_))
  );
  assert_matches!(
    set.has(&setup.field("r")),
    Err(Error::HasOnRepeatedField(_))
  );
  assert!(set.is_empty());
}

#[test]
fn repeated_operations() {
  let setup = Setup::new();
  let mut set = FieldSet::new();
  let r = setup.field("r");

  set.add_repeated(&r, Value::I32(1)).unwrap();
  set.add_repeated(&r, Value::I32(2)).unwrap();
  assert_eq!(set.repeated_count(&r).unwrap(), 2);
  assert_eq!(set.get_repeated(&r, 1).unwrap(), &Value::I32(2));

  set.set_repeated(&r, 0, Value::I32(10)).unwrap();
  assert_eq!(
    set.get(&r).into_owned(),
    FieldValue::Repeated(vec![Value::I32(10), Value::I32(2)])
  );

  assert_matches!(
    set.set_repeated(&r, 2, Value::I32(0)),
    Err(Error::IndexOutOfBounds { index: 2, len: 2, .. })
  );
  assert_matches!(
    set.get_repeated(&r, 5),
    Err(Error::IndexOutOfBounds { index: 5, len: 2, .. })
  );

  // An empty list clears the field.
  set.set(&r, FieldValue::Repeated(Vec::new())).unwrap();
  assert_eq!(set.repeated_count(&r).unwrap(), 0);
  assert!(set.is_empty());
}

#[test]
fn immutable_rejects_mutation() {
  let setup = Setup::new();
  let mut set = FieldSet::new();
  set.set(&setup.field("i"), FieldValue::Single(Value::I32(1))).unwrap();
  set.make_immutable();
  assert!(set.is_immutable());

  assert_matches!(
    set.set(&setup.field("i"), FieldValue::Single(Value::I32(2))),
    Err(Error::Immutable)
  );
  assert_matches!(
    set.add_repeated(&setup.field("r"), Value::I32(2)),
    Err(Error::Immutable)
  );
  assert_matches!(set.clear(&setup.field("i")), Err(Error::Immutable));
  assert_matches!(set.clear_all(), Err(Error::Immutable));
  assert_matches!(set.merge_from(&FieldSet::new()), Err(Error::Immutable));

  let mut copy = set.to_mutable();
  copy.set(&setup.field("i"), FieldValue::Single(Value::I32(2))).unwrap();
  assert_eq!(
    set.get(&setup.field("i")).into_owned(),
    FieldValue::Single(Value::I32(1))
  );
}

#[test]
fn all_fields_in_number_order() {
  let setup = Setup::new();
  let mut set = FieldSet::new();
  set.set(&setup.field("req"), FieldValue::Single(Value::I32(1))).unwrap();
  set.add_repeated(&setup.field("r"), Value::I32(1)).unwrap();
  set.set(&setup.field("i"), FieldValue::Single(Value::I32(1))).unwrap();

  let numbers: Vec<u32> = set.all_fields().map(|(field, _)| field.number()).collect();
  assert_eq!(numbers, vec![1, 3, 7]);
}

#[test]
fn merge() {
  let setup = Setup::new();
  let r = setup.field("r");
  let i = setup.field("i");
  let child = setup.field("child");

  let mut first = FieldSet::new();
  first.add_repeated(&r, Value::I32(1)).unwrap();
  first.set(&i, FieldValue::Single(Value::I32(1))).unwrap();

  let mut child_builder = Builder::new(&setup.message);
  child_builder.set_field(&setup.field("s"), "kept").unwrap();
  first
    .set(
      &child,
      FieldValue::Single(Value::Message(child_builder.build_partial().unwrap())),
    )
    .unwrap();

  let mut second = FieldSet::new();
  second.add_repeated(&r, Value::I32(2)).unwrap();
  second.set(&i, FieldValue::Single(Value::I32(2))).unwrap();
  second
    .set(&child, FieldValue::Single(Value::Message(setup.child(7))))
    .unwrap();

  first.merge_from(&second).unwrap();
  assert_eq!(
    first.get(&r).into_owned(),
    FieldValue::Repeated(vec![Value::I32(1), Value::I32(2)])
  );
  assert_eq!(first.get(&i).into_owned(), FieldValue::Single(Value::I32(2)));

  let merged_child = first.get(&child).into_owned();
  let merged_child = merged_child.as_single().unwrap().as_message().unwrap();
  assert_eq!(
    merged_child.get_field(&setup.field("s")).unwrap().into_owned(),
    FieldValue::Single(Value::String("kept".to_string()))
  );
  assert_eq!(
    merged_child.get_field(&i).unwrap().into_owned(),
    FieldValue::Single(Value::I32(7))
  );
}

#[test]
fn initialization_of_embedded_messages() {
  let setup = Setup::new();
  let mut set = FieldSet::new();
  assert!(set.is_initialized());

  // `req` is missing in the child.
  set
    .add_repeated(&setup.field("kids"), Value::Message(setup.child(1)))
    .unwrap();
  assert!(!set.is_initialized());
}

#[test]
fn size_matches_encoding() {
  let setup = Setup::new();
  let mut set = FieldSet::new();
  set.set(&setup.field("i"), FieldValue::Single(Value::I32(-1))).unwrap();
  set.add_repeated(&setup.field("r"), Value::I32(-1)).unwrap();
  set.add_repeated(&setup.field("r"), Value::I32(300)).unwrap();
  set
    .set(&setup.field("child"), FieldValue::Single(Value::Message(setup.child(3))))
    .unwrap();

  let mut buffer = vec![0; set.serialized_size()];
  let mut writer = CodedWriter::from_slice(&mut buffer);
  set.write_to(&mut writer).unwrap();
  writer.check_no_space_left().unwrap();

  assert_eq!(
    buffer,
    vec![
      // i = -1 as a ten byte varint
      0x08, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01, //
      // r = [-1, 300] zig-zag encoded
      0x18, 0x01, 0x18, 0xd8, 0x04, //
      // child { i = 3 }
      0x2a, 0x02, 0x08, 0x03,
    ]
  );
}
