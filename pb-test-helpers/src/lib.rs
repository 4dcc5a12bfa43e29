// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

pub mod random;
pub mod schema;

const DEFAULT_FILTER_RULES: &str = "info";

// Installs a stderr logger filtered by RUST_LOG. `log` records from the library crates are
// forwarded through tracing-subscriber's log bridge.
pub fn test_global_init() {
  let stderr = tracing_subscriber::fmt::layer()
    .with_writer(std::io::stderr)
    .with_line_number(true)
    .compact();

  let filter = EnvFilter::new(
    std::env::var("RUST_LOG")
      .as_deref()
      .unwrap_or(DEFAULT_FILTER_RULES),
  );

  // Every test module registers a ctor calling this, so only the first call installs anything.
  let _ignored = Registry::default().with(filter).with(stderr).try_init();
}
