// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use arbitrary::{Arbitrary, Unstructured};
use pb_message::MessageDescriptor;
use pb_test_helpers::schema::test_schema;

pub mod builder_fuzz_test;
pub mod parse_fuzz_test;

#[cfg(test)]
#[ctor::ctor]
fn test_global_init() {
  pb_test_helpers::test_global_init();
}

/// Message types of the shared test schema that fuzz input is decoded as.
#[derive(Arbitrary, Clone, Copy, Debug)]
pub enum MessageType {
  AllTypes,
  Empty,
  RequiredForeign,
  Recursive,
  Extendable,
  MessageSetContainer,
}

impl MessageType {
  #[must_use]
  pub fn descriptor(self) -> MessageDescriptor {
    let schema = test_schema();
    match self {
      Self::AllTypes => schema.test_all_types(),
      Self::Empty => schema.test_empty_message(),
      Self::RequiredForeign => schema.test_required_foreign(),
      Self::Recursive => schema.test_recursive(),
      Self::Extendable => schema.test_extendable(),
      Self::MessageSetContainer => schema.message("test.TestMessageSetContainer"),
    }
  }
}

/// Decodes each input into a test case and runs `fuzzer` on it. Inputs too short to produce a
/// test case are skipped.
pub fn run_all_inputs<T: for<'a> Arbitrary<'a>>(
  inputs: impl IntoIterator<Item = Vec<u8>>,
  fuzzer: impl Fn(T),
) {
  for input in inputs {
    let Ok(test_case) = T::arbitrary(&mut Unstructured::new(&input)) else {
      log::debug!("skipping input of {} bytes", input.len());
      continue;
    };
    fuzzer(test_case);
  }
}

#[cfg(test)]
pub(crate) fn sample_inputs() -> impl Iterator<Item = Vec<u8>> {
  (0u8 .. 64).map(|seed| {
    (0u8 .. 255)
      .map(|i| i.wrapping_mul(seed).wrapping_add(seed.rotate_left(3)))
      .collect()
  })
}
