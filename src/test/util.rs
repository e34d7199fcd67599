/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Shared helpers for server scenario tests.

use std::num::NonZeroUsize;
use std::path::Path;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::config::ServerConfiguration;
use crate::module::handle::FileHandle;
use crate::server::dispatcher::Server;
use crate::server::protocol::ErrorsByFile;
use crate::server::protocol::Request;
use crate::server::protocol::Response;

pub struct TestServer {
    pub root: TempDir,
    pub server: Server,
}

/// A server over a temporary source tree seeded with `files`. The tree is
/// populated at construction, as in production.
pub fn server_with_files(files: &[(&str, &str)]) -> TestServer {
    let root = TempDir::new().unwrap();
    for (name, text) in files {
        write_file(root.path(), name, text);
    }
    let mut configuration = ServerConfiguration::new(root.path().to_path_buf());
    configuration.workers = NonZeroUsize::new(2).unwrap();
    let server = Server::new(configuration);
    TestServer { root, server }
}

pub fn write_file(root: &Path, name: &str, text: &str) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, text).unwrap();
}

impl TestServer {
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    pub fn handle(&self, name: &str) -> FileHandle {
        FileHandle::new(Path::new(name), self.root.path()).unwrap()
    }

    pub fn write(&self, name: &str, text: &str) {
        write_file(self.root.path(), name, text);
    }

    pub fn process(&mut self, request: Request) -> Option<Response> {
        self.server.process(request).unwrap()
    }

    /// Run a type-check request and return its errors map.
    pub fn type_check(&mut self, update: &[&str], check: &[&str]) -> ErrorsByFile {
        let request = Request::TypeCheck {
            update_environment_with: update.iter().map(|name| self.path(name)).collect(),
            check: check.iter().map(|name| self.path(name)).collect(),
        };
        match self.process(request) {
            Some(Response::TypeCheck(errors)) => errors,
            other => panic!("expected a type-check response, got {other:?}"),
        }
    }
}
