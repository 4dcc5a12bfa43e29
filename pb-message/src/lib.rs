// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#![deny(
  clippy::expect_used,
  clippy::panic,
  clippy::todo,
  clippy::unimplemented,
  clippy::unreachable,
  clippy::unwrap_used
)]

//! Schema driven messages on top of [`pb_wire`].
//!
//! A [`descriptor::Schema`] is built once with [`descriptor::SchemaBuilder`] and shared through
//! [`std::sync::Arc`]. Messages are immutable [`message::Message`] handles produced by a
//! [`message::Builder`]. Field values live in a [`field_set::FieldSet`], fields the schema does
//! not know about are kept verbatim in an [`unknown::UnknownFieldSet`], and extensions are
//! resolved while parsing through an [`extension::ExtensionRegistry`].

pub mod codec;
mod decode;
pub mod descriptor;
pub mod extension;
pub mod field_set;
pub mod message;
pub mod unknown;
pub mod value;

pub use descriptor::{
  Cardinality,
  EnumDescriptor,
  FieldDescriptor,
  FieldSpec,
  FieldType,
  MessageDescriptor,
  Schema,
  SchemaBuilder,
};
pub use extension::{ExtensionInfo, ExtensionRegistry};
pub use field_set::FieldSet;
pub use message::{Builder, Message};
pub use pb_wire::ErrorKind;
pub use unknown::{UnknownField, UnknownFieldSet, UnknownFieldSetBuilder};
pub use value::{FieldValue, Value};

//
// UninitializedMessageError
//

/// Returned by [`message::Builder::build`] when required fields are missing. Each entry of
/// `missing_fields` is a path from the message being built, e.g. `"a"`, `"b.c"` or `"d[2].e"`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("message of type {message_type} is missing required fields: {}", .missing_fields.join(", "))]
pub struct UninitializedMessageError {
  pub message_type: String,
  pub missing_fields: Vec<String>,
}

impl UninitializedMessageError {
  /// Converts into the wire level error reported by parse entry points, so that incomplete input
  /// surfaces as malformed input rather than API misuse.
  #[must_use]
  pub fn into_malformed_input(self) -> pb_wire::Error {
    pb_wire::Error::MissingRequiredFields(self.missing_fields.join(", "))
  }
}

//
// Error
//

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error(transparent)]
  Wire(#[from] pb_wire::Error),
  #[error("field {field} of {message_type} cannot hold a value of type {actual}")]
  TypeMismatch {
    message_type: String,
    field: String,
    actual: String,
  },
  #[error("field {0} was given a value of the wrong cardinality")]
  FieldCardinality(String),
  #[error("has() is undefined for repeated field {0}, use the repeated count instead")]
  HasOnRepeatedField(String),
  #[error("unknown fields may not use field number zero")]
  ZeroFieldNumber,
  #[error("field {field} does not belong to message type {expected}")]
  WrongContainingType { field: String, expected: String },
  #[error("expected a message of type {expected} but got {actual}")]
  MessageTypeMismatch { expected: String, actual: String },
  #[error("field {0} is not an extension")]
  NotAnExtension(String),
  #[error("message typed extension {0} requires a default instance")]
  MissingDefaultInstance(String),
  #[error("extension registry is read only")]
  ReadOnlyRegistry,
  #[error("builder for {0} was already used to build a message")]
  AlreadyBuilt(String),
  #[error("field set is immutable")]
  Immutable,
  #[error("index {index} is out of bounds for field {field} with {len} elements")]
  IndexOutOfBounds {
    field: String,
    index: usize,
    len: usize,
  },
  #[error(transparent)]
  UninitializedMessage(#[from] UninitializedMessageError),
  #[error("invalid schema: {0}")]
  InvalidSchema(String),
}

impl Error {
  #[must_use]
  pub const fn kind(&self) -> ErrorKind {
    match self {
      Self::Wire(e) => e.kind(),
      Self::TypeMismatch { .. }
      | Self::FieldCardinality(_)
      | Self::HasOnRepeatedField(_)
      | Self::ZeroFieldNumber
      | Self::WrongContainingType { .. }
      | Self::MessageTypeMismatch { .. }
      | Self::NotAnExtension(_)
      | Self::MissingDefaultInstance(_)
      | Self::ReadOnlyRegistry
      | Self::AlreadyBuilt(_)
      | Self::Immutable
      | Self::IndexOutOfBounds { .. } => ErrorKind::Contract,
      Self::UninitializedMessage(_) => ErrorKind::Completeness,
      Self::InvalidSchema(_) => ErrorKind::Schema,
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;
