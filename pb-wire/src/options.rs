// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

pub const DEFAULT_RECURSION_LIMIT: u32 = 64;
pub const DEFAULT_SIZE_LIMIT: usize = 64 << 20;
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

//
// ReaderOptions
//

/// Resource bounds applied while decoding. Both limits are checked as parsing proceeds so that
/// adversarial input is rejected before the offending data is materialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaderOptions {
  /// Maximum nesting depth of embedded messages and groups.
  pub recursion_limit: u32,
  /// Maximum number of bytes consumed since the reader was created or its size counter was
  /// reset.
  pub size_limit: usize,
  /// Size of the refill buffer used when reading from a stream. Ignored for slice sources.
  pub buffer_size: usize,
}

impl Default for ReaderOptions {
  fn default() -> Self {
    Self {
      recursion_limit: DEFAULT_RECURSION_LIMIT,
      size_limit: DEFAULT_SIZE_LIMIT,
      buffer_size: DEFAULT_BUFFER_SIZE,
    }
  }
}

impl ReaderOptions {
  #[must_use]
  pub const fn with_recursion_limit(mut self, recursion_limit: u32) -> Self {
    self.recursion_limit = recursion_limit;
    self
  }

  #[must_use]
  pub const fn with_size_limit(mut self, size_limit: usize) -> Self {
    self.size_limit = size_limit;
    self
  }

  #[must_use]
  pub const fn with_buffer_size(mut self, buffer_size: usize) -> Self {
    self.buffer_size = buffer_size;
    self
  }
}

//
// WriterOptions
//

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriterOptions {
  /// Size of the intermediate buffer used when writing to a stream. Ignored for slice sinks.
  pub buffer_size: usize,
}

impl Default for WriterOptions {
  fn default() -> Self {
    Self {
      buffer_size: DEFAULT_BUFFER_SIZE,
    }
  }
}

impl WriterOptions {
  #[must_use]
  pub const fn with_buffer_size(mut self, buffer_size: usize) -> Self {
    self.buffer_size = buffer_size;
    self
  }
}
