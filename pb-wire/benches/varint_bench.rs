// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use criterion::{Criterion, criterion_group, criterion_main};
use pb_wire::varint::{decode_varint64, encode_varint64};
use pb_wire::{CodedReader, CodedWriter};
use std::hint::black_box;

const VALUES: [u64; 6] = [0, 127, 128, 1 << 21, 1 << 35, u64::MAX];

fn encoded_values() -> Vec<u8> {
  let mut buf = Vec::new();
  for _ in 0 .. 100 {
    for value in VALUES {
      encode_varint64(value, &mut buf);
    }
  }
  buf
}

fn criterion_benchmark(c: &mut Criterion) {
  let encoded = encoded_values();

  c.bench_function("encode varint64", |b| {
    let mut buf = Vec::with_capacity(encoded.len());
    b.iter(|| {
      buf.clear();
      for _ in 0 .. 100 {
        for value in VALUES {
          encode_varint64(black_box(value), &mut buf);
        }
      }
    });
  });

  c.bench_function("decode varint64", |b| {
    b.iter(|| {
      let mut slice = black_box(encoded.as_slice());
      while !slice.is_empty() {
        black_box(decode_varint64(&mut slice).ok());
      }
    });
  });

  c.bench_function("writer uint64 fields", |b| {
    let mut buf = vec![0; 2 * encoded.len()];
    b.iter(|| {
      let mut writer = CodedWriter::from_slice(&mut buf);
      for value in VALUES.iter().cycle().take(600) {
        let _ = writer.write_uint64(1, black_box(*value));
      }
      black_box(writer.position());
    });
  });

  c.bench_function("reader uint64 fields", |b| {
    let mut buf = vec![0; 2 * encoded.len()];
    let len = {
      let mut writer = CodedWriter::from_slice(&mut buf);
      for value in VALUES.iter().cycle().take(600) {
        let _ = writer.write_uint64(1, *value);
      }
      writer.position()
    };
    b.iter(|| {
      let mut reader = CodedReader::from_slice(black_box(&buf[.. len]));
      while let Ok(tag) = reader.read_tag() {
        if tag == 0 {
          break;
        }
        black_box(reader.read_uint64().ok());
      }
    });
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
