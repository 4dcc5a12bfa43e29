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

//! Low level protobuf wire format primitives.
//!
//! - [`varint`] - base-128 variable length integers and zig-zag mapping
//! - [`tag`] - wire types and tag packing
//! - [`size`] - exact encoded size computation for every scalar kind
//! - [`writer`] - [`CodedWriter`], a tag+value encoder over a fixed slice or a buffered stream
//! - [`reader`] - [`CodedReader`], a tag+value decoder with recursion and size limits

pub mod options;
pub mod reader;
pub mod size;
pub mod tag;
pub mod varint;
pub mod writer;

pub use options::{ReaderOptions, WriterOptions};
pub use reader::CodedReader;
pub use tag::{WireType, make_tag, tag_field_number, tag_wire_type};
pub use writer::{CodedWriter, WireMessage};

/// Broad classification of failures so that callers can react differently to malformed input,
/// suspected resource exhaustion attacks and local API misuse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  MalformedInput,
  ResourceLimit,
  Contract,
  Completeness,
  Capacity,
  Io,
  Schema,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("varint was longer than 10 bytes")]
  MalformedVarint,
  #[error("input ended unexpectedly in the middle of a field")]
  TruncatedMessage,
  #[error("length-delimited field claimed to have a negative size")]
  NegativeSize,
  #[error("message contained an invalid tag (zero)")]
  InvalidTag,
  #[error("end-group tag did not match the expected tag")]
  InvalidEndTag,
  #[error("tag {0} has an invalid wire type")]
  InvalidWireType(u32),
  #[error("string field contained invalid UTF-8")]
  InvalidUtf8,
  #[error("message is missing required fields: {0}")]
  MissingRequiredFields(String),
  #[error("message had too many levels of nesting (limit {0})")]
  RecursionLimitExceeded(u32),
  #[error("message was too large (limit {0} bytes)")]
  SizeLimitExceeded(usize),
  #[error("attempted to write past the end of a fixed size buffer")]
  OutOfSpace,
  #[error("did not write as much data as expected, {0} bytes left in the buffer")]
  SpaceLeftOver(usize),
  #[error("an io error occurred: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  #[must_use]
  pub const fn kind(&self) -> ErrorKind {
    match self {
      Self::MalformedVarint
      | Self::TruncatedMessage
      | Self::NegativeSize
      | Self::InvalidTag
      | Self::InvalidEndTag
      | Self::InvalidWireType(_)
      | Self::InvalidUtf8
      | Self::MissingRequiredFields(_) => ErrorKind::MalformedInput,
      Self::RecursionLimitExceeded(_) | Self::SizeLimitExceeded(_) => ErrorKind::ResourceLimit,
      Self::OutOfSpace | Self::SpaceLeftOver(_) => ErrorKind::Capacity,
      Self::Io(_) => ErrorKind::Io,
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;
