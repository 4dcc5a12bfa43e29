// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./extension_test.rs"]
mod extension_test;

use crate::descriptor::{FieldDescriptor, MessageDescriptor};
use crate::message::Message;
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

static EMPTY: LazyLock<ExtensionRegistry> =
  LazyLock::new(|| ExtensionRegistry::new().as_read_only());

//
// ExtensionInfo
//

/// A registered extension. Message typed extensions carry the default instance of their type,
/// which seeds the builder used when the extension is parsed.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtensionInfo {
  pub descriptor: FieldDescriptor,
  pub default_instance: Option<Message>,
}

#[derive(Default)]
struct Tables {
  by_name: HashMap<String, ExtensionInfo>,
  // Containing type full name to field number.
  by_number: HashMap<String, HashMap<u32, ExtensionInfo>>,
}

//
// ExtensionRegistry
//

/// The extensions a parser may resolve. Read only views created with
/// [`ExtensionRegistry::as_read_only`] share the tables of the registry they were created from.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
  tables: Arc<RwLock<Tables>>,
  read_only: bool,
}

impl std::fmt::Debug for ExtensionRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ExtensionRegistry")
      .field("len", &self.len())
      .field("read_only", &self.read_only)
      .finish()
  }
}

impl ExtensionRegistry {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// The shared registry with no extensions, used when a message is parsed without extensions.
  #[must_use]
  pub fn empty() -> &'static Self {
    &EMPTY
  }

  #[must_use]
  pub fn as_read_only(&self) -> Self {
    Self {
      tables: self.tables.clone(),
      read_only: true,
    }
  }

  #[must_use]
  pub const fn is_read_only(&self) -> bool {
    self.read_only
  }

  /// Registers an extension. A later registration for the same name or number replaces the
  /// earlier one.
  pub fn add(&self, info: ExtensionInfo) -> Result<()> {
    if self.read_only {
      return Err(Error::ReadOnlyRegistry);
    }
    let descriptor = &info.descriptor;
    if !descriptor.is_extension() {
      return Err(Error::NotAnExtension(descriptor.full_name().to_string()));
    }

    let message_type = descriptor.message_type();
    if let Some(message_type) = &message_type {
      let Some(default_instance) = &info.default_instance else {
        return Err(Error::MissingDefaultInstance(
          descriptor.full_name().to_string(),
        ));
      };
      if default_instance.descriptor() != message_type {
        return Err(Error::MessageTypeMismatch {
          expected: message_type.full_name().to_string(),
          actual: default_instance.descriptor().full_name().to_string(),
        });
      }
    }

    let containing_type = descriptor.containing_type();
    let mut tables = self.tables.write();

    // MessageSet extensions declared inside their own message type are also known by that
    // type's name.
    if let Some(message_type) = message_type
      && descriptor.is_message_set_item()
      && descriptor.extension_scope().as_ref() == Some(&message_type)
    {
      tables
        .by_name
        .insert(message_type.full_name().to_string(), info.clone());
    }

    if tables
      .by_number
      .entry(containing_type.full_name().to_string())
      .or_default()
      .insert(descriptor.number(), info.clone())
      .is_some()
    {
      log::debug!(
        "extension number {} of {} registered again, replacing the earlier registration",
        descriptor.number(),
        containing_type.full_name()
      );
    }
    log::trace!("registered extension {}", descriptor.full_name());
    tables
      .by_name
      .insert(descriptor.full_name().to_string(), info);
    Ok(())
  }

  /// Registers `descriptor`, taking the default instance of message typed extensions from the
  /// schema.
  pub fn add_descriptor(&self, descriptor: &FieldDescriptor) -> Result<()> {
    self.add(ExtensionInfo {
      descriptor: descriptor.clone(),
      default_instance: descriptor
        .message_type()
        .map(|message_type| message_type.default_instance()),
    })
  }

  #[must_use]
  pub fn lookup_by_name(&self, full_name: &str) -> Option<ExtensionInfo> {
    self.tables.read().by_name.get(full_name).cloned()
  }

  /// Finds the extension numbered `field_number` that extends `containing_type`.
  #[must_use]
  pub fn lookup_by_number(
    &self,
    containing_type: &MessageDescriptor,
    field_number: u32,
  ) -> Option<ExtensionInfo> {
    self
      .tables
      .read()
      .by_number
      .get(containing_type.full_name())
      .and_then(|by_number| by_number.get(&field_number))
      .filter(|info| info.descriptor.containing_type() == *containing_type)
      .cloned()
  }

  /// Number of registered extensions, not counting MessageSet aliases.
  #[must_use]
  pub fn len(&self) -> usize {
    self.tables.read().by_number.values().map(HashMap::len).sum()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
