// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::MessageType;
use arbitrary::Arbitrary;
use pb_message::{Builder, ExtensionRegistry, Message, MessageDescriptor};
use pb_test_helpers::schema::test_schema;
use pb_wire::{CodedReader, ReaderOptions};

#[derive(Arbitrary, Debug)]
pub struct ParseFuzzTestCase {
  message_type: MessageType,
  use_registry: bool,
  recursion_limit: u8,
  // Also parse through a stream reader with this refill buffer size.
  stream_buffer_size: Option<u8>,
  input: Vec<u8>,
}

fn parse(
  descriptor: &MessageDescriptor,
  input: &[u8],
  registry: &ExtensionRegistry,
  options: ReaderOptions,
  stream_buffer_size: Option<u8>,
) -> pb_message::Result<Message> {
  let mut builder = Builder::new(descriptor);
  if let Some(buffer_size) = stream_buffer_size {
    let mut input = input;
    let mut reader = CodedReader::from_stream_with_options(
      &mut input,
      options.with_buffer_size(usize::from(buffer_size)),
    );
    builder.merge_from_reader(&mut reader, registry)?;
    reader.check_last_tag_was(0)?;
  } else {
    let mut reader = CodedReader::from_slice_with_options(input, options);
    builder.merge_from_reader(&mut reader, registry)?;
    reader.check_last_tag_was(0)?;
  }
  builder.build_partial()
}

/// Parses arbitrary bytes. Whatever parses must encode to exactly its computed size, and encoding
/// must be stable: parsing the encoding and encoding again yields the same bytes.
pub fn run(test_case: &ParseFuzzTestCase) {
  let schema = test_schema();
  let descriptor = test_case.message_type.descriptor();
  let full_registry = schema.registry();
  let registry = if test_case.use_registry {
    &full_registry
  } else {
    ExtensionRegistry::empty()
  };
  let options =
    ReaderOptions::default().with_recursion_limit(u32::from(test_case.recursion_limit));

  let parsed = parse(&descriptor, &test_case.input, registry, options, None);
  if test_case.stream_buffer_size.is_some() {
    let streamed = parse(
      &descriptor,
      &test_case.input,
      registry,
      options,
      test_case.stream_buffer_size,
    );
    match (&parsed, &streamed) {
      (Ok(parsed), Ok(streamed)) => {
        assert_eq!(parsed.to_bytes().unwrap(), streamed.to_bytes().unwrap());
      },
      (Err(_), Err(_)) => {},
      (parsed, streamed) => panic!("slice and stream readers disagree: {parsed:?} {streamed:?}"),
    }
  }

  let message = match parsed {
    Ok(message) => message,
    Err(e) => {
      log::trace!("input rejected: {e}");
      return;
    },
  };

  let encoded = message.to_bytes().unwrap();
  assert_eq!(encoded.len(), message.serialized_size());

  let reparsed = parse(&descriptor, &encoded, registry, options, None).unwrap();
  assert_eq!(reparsed.to_bytes().unwrap(), encoded);
}

#[test]
fn run_sample_inputs() {
  crate::run_all_inputs(crate::sample_inputs(), |test_case: ParseFuzzTestCase| {
    run(&test_case);
  });
}

#[test]
fn run_valid_encodings() {
  for use_registry in [false, true] {
    for message_type in [
      MessageType::AllTypes,
      MessageType::Empty,
      MessageType::Extendable,
    ] {
      run(&ParseFuzzTestCase {
        message_type,
        use_registry,
        recursion_limit: 64,
        stream_buffer_size: Some(7),
        input: pb_test_helpers::schema::all_fields_set().to_bytes().unwrap(),
      });
    }
  }
}
