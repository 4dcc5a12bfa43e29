// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

//! Seeded random message generation.

use bytes::Bytes;
use pb_message::{
  Builder,
  FieldDescriptor,
  FieldType,
  Message,
  MessageDescriptor,
  UnknownField,
  UnknownFieldSet,
  Value,
};
use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Unknown fields are generated above every field number the test schema declares.
const UNKNOWN_FIELD_NUMBERS: std::ops::Range<u32> = 1000 .. 2000;
const MAX_DEPTH: u32 = 3;

pub struct RandomMessages {
  rng: StdRng,
}

impl RandomMessages {
  #[must_use]
  pub fn new(seed: u64) -> Self {
    Self {
      rng: StdRng::seed_from_u64(seed),
    }
  }

  /// A message of type `descriptor` with a random subset of its fields set, random embedded
  /// messages up to a fixed depth, and a few random unknown fields.
  pub fn message(&mut self, descriptor: &MessageDescriptor) -> Message {
    self.message_at_depth(descriptor, 0)
  }

  fn message_at_depth(&mut self, descriptor: &MessageDescriptor, depth: u32) -> Message {
    let mut builder = Builder::new(descriptor);
    for field in descriptor.fields() {
      if !self.rng.random_bool(0.5) {
        continue;
      }
      if field.field_type().message_type().is_some() && depth >= MAX_DEPTH {
        continue;
      }

      if field.is_repeated() {
        for _ in 0 .. self.rng.random_range(1 ..= 4) {
          let value = self.value(&field, depth);
          builder.add_repeated_field(&field, value).unwrap();
        }
      } else {
        let value = self.value(&field, depth);
        builder.set_field(&field, value).unwrap();
      }
    }

    if depth == 0 {
      builder.set_unknown_fields(&self.unknown_fields()).unwrap();
    }
    builder.build_partial().unwrap()
  }

  fn string(&mut self) -> String {
    let len = self.rng.random_range(0 .. 40);
    (&mut self.rng)
      .sample_iter(Alphanumeric)
      .take(len)
      .map(char::from)
      .collect()
  }

  fn bytes(&mut self) -> Bytes {
    let len = self.rng.random_range(0 .. 300);
    (0 .. len).map(|_| self.rng.random::<u8>()).collect()
  }

  fn value(&mut self, field: &FieldDescriptor, depth: u32) -> Value {
    match field.field_type() {
      FieldType::Int32 | FieldType::SInt32 | FieldType::SFixed32 => Value::I32(self.rng.random()),
      FieldType::Int64 | FieldType::SInt64 | FieldType::SFixed64 => Value::I64(self.rng.random()),
      FieldType::UInt32 | FieldType::Fixed32 => Value::U32(self.rng.random()),
      FieldType::UInt64 | FieldType::Fixed64 => Value::U64(self.rng.random()),
      FieldType::Float => Value::F32(self.rng.random_range(-1e6 .. 1e6)),
      FieldType::Double => Value::F64(self.rng.random_range(-1e12 .. 1e12)),
      FieldType::Bool => Value::Bool(self.rng.random()),
      FieldType::String => Value::String(self.string()),
      FieldType::Bytes => Value::Bytes(self.bytes()),
      FieldType::Enum(_) => {
        let values: Vec<i32> = field
          .enum_type()
          .unwrap()
          .values()
          .map(|(_, number)| number)
          .collect();
        Value::Enum(values[self.rng.random_range(0 .. values.len())])
      },
      FieldType::Message(_) | FieldType::Group(_) => {
        Value::Message(self.message_at_depth(&field.message_type().unwrap(), depth + 1))
      },
    }
  }

  /// A handful of unknown fields of every wire type, numbered from 1000.
  pub fn unknown_fields(&mut self) -> UnknownFieldSet {
    let mut builder = UnknownFieldSet::new().to_builder();
    for _ in 0 .. self.rng.random_range(0 ..= 3) {
      let number = self.rng.random_range(UNKNOWN_FIELD_NUMBERS);
      let mut field = UnknownField::new();
      match self.rng.random_range(0 .. 5) {
        0 => {
          field.add_varint(self.rng.random());
        },
        1 => {
          field.add_fixed32(self.rng.random());
        },
        2 => {
          field.add_fixed64(self.rng.random());
        },
        3 => {
          let bytes = self.bytes();
          field.add_length_delimited(bytes);
        },
        _ => {
          let mut group = UnknownFieldSet::new().to_builder();
          group
            .merge_varint_field(self.rng.random_range(1 .. 100), self.rng.random())
            .unwrap();
          field.add_group(group.build());
        },
      }
      builder.merge_field(number, &field).unwrap();
    }
    builder.build()
  }
}
