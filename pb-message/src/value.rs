// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./value_test.rs"]
mod value_test;

use crate::descriptor::FieldType;
use crate::message::Message;
use bytes::Bytes;

//
// Value
//

/// A single field value. Signed, unsigned and zig-zag encodings of the same width share a variant;
/// the field's declared [`FieldType`] decides how it is encoded.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  Bool(bool),
  I32(i32),
  I64(i64),
  U32(u32),
  U64(u64),
  F32(f32),
  F64(f64),
  String(String),
  Bytes(Bytes),
  Enum(i32),
  Message(Message),
}

impl Value {
  #[must_use]
  pub const fn type_name(&self) -> &'static str {
    match self {
      Self::Bool(_) => "bool",
      Self::I32(_) => "int32",
      Self::I64(_) => "int64",
      Self::U32(_) => "uint32",
      Self::U64(_) => "uint64",
      Self::F32(_) => "float",
      Self::F64(_) => "double",
      Self::String(_) => "string",
      Self::Bytes(_) => "bytes",
      Self::Enum(_) => "enum",
      Self::Message(_) => "message",
    }
  }

  /// Whether this value has the in-memory representation used by `field_type`. Message values
  /// additionally need their type checked against the field's message type.
  #[must_use]
  pub const fn matches_type(&self, field_type: FieldType) -> bool {
    match field_type {
      FieldType::Int32 | FieldType::SInt32 | FieldType::SFixed32 => matches!(self, Self::I32(_)),
      FieldType::Int64 | FieldType::SInt64 | FieldType::SFixed64 => matches!(self, Self::I64(_)),
      FieldType::UInt32 | FieldType::Fixed32 => matches!(self, Self::U32(_)),
      FieldType::UInt64 | FieldType::Fixed64 => matches!(self, Self::U64(_)),
      FieldType::Float => matches!(self, Self::F32(_)),
      FieldType::Double => matches!(self, Self::F64(_)),
      FieldType::Bool => matches!(self, Self::Bool(_)),
      FieldType::String => matches!(self, Self::String(_)),
      FieldType::Bytes => matches!(self, Self::Bytes(_)),
      FieldType::Enum(_) => matches!(self, Self::Enum(_)),
      FieldType::Message(_) | FieldType::Group(_) => matches!(self, Self::Message(_)),
    }
  }

  #[must_use]
  pub const fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Bool(v) => Some(*v),
      _ => None,
    }
  }

  #[must_use]
  pub const fn as_i32(&self) -> Option<i32> {
    match self {
      Self::I32(v) => Some(*v),
      _ => None,
    }
  }

  #[must_use]
  pub const fn as_i64(&self) -> Option<i64> {
    match self {
      Self::I64(v) => Some(*v),
      _ => None,
    }
  }

  #[must_use]
  pub const fn as_u32(&self) -> Option<u32> {
    match self {
      Self::U32(v) => Some(*v),
      _ => None,
    }
  }

  #[must_use]
  pub const fn as_u64(&self) -> Option<u64> {
    match self {
      Self::U64(v) => Some(*v),
      _ => None,
    }
  }

  #[must_use]
  pub const fn as_f32(&self) -> Option<f32> {
    match self {
      Self::F32(v) => Some(*v),
      _ => None,
    }
  }

  #[must_use]
  pub const fn as_f64(&self) -> Option<f64> {
    match self {
      Self::F64(v) => Some(*v),
      _ => None,
    }
  }

  #[must_use]
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::String(v) => Some(v),
      _ => None,
    }
  }

  #[must_use]
  pub const fn as_bytes(&self) -> Option<&Bytes> {
    match self {
      Self::Bytes(v) => Some(v),
      _ => None,
    }
  }

  #[must_use]
  pub const fn as_enum(&self) -> Option<i32> {
    match self {
      Self::Enum(v) => Some(*v),
      _ => None,
    }
  }

  #[must_use]
  pub const fn as_message(&self) -> Option<&Message> {
    match self {
      Self::Message(v) => Some(v),
      _ => None,
    }
  }
}

macro_rules! value_from {
  ($($ty:ty => $variant:ident),* $(,)?) => {
    $(
      impl From<$ty> for Value {
        fn from(value: $ty) -> Self {
          Self::$variant(value)
        }
      }

      impl From<$ty> for FieldValue {
        fn from(value: $ty) -> Self {
          Self::Single(Value::$variant(value))
        }
      }
    )*
  };
}

value_from!(
  bool => Bool,
  i32 => I32,
  i64 => I64,
  u32 => U32,
  u64 => U64,
  f32 => F32,
  f64 => F64,
  String => String,
  Bytes => Bytes,
  Message => Message,
);

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Self::String(value.to_string())
  }
}

impl From<&str> for FieldValue {
  fn from(value: &str) -> Self {
    Self::Single(value.into())
  }
}

impl From<Vec<u8>> for Value {
  fn from(value: Vec<u8>) -> Self {
    Self::Bytes(value.into())
  }
}

//
// FieldValue
//

/// The value of a whole field: one value for singular fields, a list for repeated ones.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
  Single(Value),
  Repeated(Vec<Value>),
}

impl FieldValue {
  #[must_use]
  pub const fn as_single(&self) -> Option<&Value> {
    match self {
      Self::Single(value) => Some(value),
      Self::Repeated(_) => None,
    }
  }

  #[must_use]
  pub fn as_repeated(&self) -> Option<&[Value]> {
    match self {
      Self::Single(_) => None,
      Self::Repeated(values) => Some(values),
    }
  }

  #[must_use]
  pub const fn is_repeated(&self) -> bool {
    matches!(self, Self::Repeated(_))
  }
}

impl From<Value> for FieldValue {
  fn from(value: Value) -> Self {
    Self::Single(value)
  }
}

impl From<Vec<Value>> for FieldValue {
  fn from(values: Vec<Value>) -> Self {
    Self::Repeated(values)
  }
}
