/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use clap::Parser;
use pycheckd::commands::serve::Args;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logging goes to stderr; sockets carry only frames.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    Args::parse().run()
}
